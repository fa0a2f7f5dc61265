//! Keeps the workstation's `jts.ini` usable for unattended logins.
//!
//! Two settings must be present: `[Logon] s3store` (an explicit `false` is
//! respected) and `[IBGateway] ApiOnly=true`. Everything else in the file is
//! carried over untouched.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::errors::ExitCode;

pub const FILE_NAME: &str = "jts.ini";

const LOGON: &str = "[Logon]";
const IB_GATEWAY: &str = "[IBGateway]";
const S3STORE_TRUE: &str = "s3store=true";
const S3STORE_FALSE: &str = "s3store=false";
const API_ONLY_TRUE: &str = "ApiOnly=true";

#[derive(Error, Debug)]
pub enum JtsIniError {
    #[error("{} already exists but is a directory", .0.display())]
    InvalidPath(PathBuf),

    #[error("unexpected I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl JtsIniError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            JtsIniError::InvalidPath(_) => ExitCode::InvalidJtsIniPath,
            JtsIniError::Io { .. } => ExitCode::JtsIniIo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JtsIniOutcome {
    AlreadyValid,
    Created,
    Rewritten,
}

struct Requirement {
    section: &'static str,
    key: &'static str,
    accepted: &'static [&'static str],
}

const REQUIREMENTS: [Requirement; 2] = [
    Requirement {
        section: LOGON,
        key: "s3store=",
        accepted: &[S3STORE_TRUE, S3STORE_FALSE],
    },
    Requirement {
        section: IB_GATEWAY,
        key: "ApiOnly=",
        accepted: &[API_ONLY_TRUE],
    },
];

impl Requirement {
    fn default_line(&self) -> &'static str {
        self.accepted[0]
    }
}

fn section_lines<'a>(lines: &'a [String], section: &str) -> Option<&'a [String]> {
    let start = lines.iter().position(|line| line.as_str() == section)? + 1;
    let len = lines[start..]
        .iter()
        .position(|line| line.starts_with('['))
        .unwrap_or(lines.len() - start);
    Some(&lines[start..start + len])
}

/// True when every required setting is present with an accepted value.
pub fn is_valid(lines: &[String]) -> bool {
    REQUIREMENTS.iter().all(|req| {
        section_lines(lines, req.section)
            .map(|body| body.iter().any(|line| req.accepted.contains(&line.as_str())))
            .unwrap_or(false)
    })
}

/// Rewrites `lines` so the required settings are present.
///
/// Blank lines inside a required section are dropped and the section is
/// closed with one blank line. Other values of a required key are replaced.
pub fn repair(lines: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len() + 6);
    let mut seen = [false; REQUIREMENTS.len()];
    let mut i = 0;

    while i < lines.len() {
        let line = &lines[i];
        i += 1;
        out.push(line.clone());

        let Some(index) = REQUIREMENTS.iter().position(|req| req.section == line.as_str()) else {
            continue;
        };
        let req = &REQUIREMENTS[index];
        seen[index] = true;

        let mut found = false;
        while i < lines.len() && !lines[i].starts_with('[') {
            let body = &lines[i];
            i += 1;
            if body.is_empty() {
                continue;
            }
            if req.accepted.contains(&body.as_str()) {
                found = true;
            } else if body.starts_with(req.key) {
                debug!(line = %body, "replacing unexpected setting");
                continue;
            }
            out.push(body.clone());
        }
        if !found {
            out.push(req.default_line().to_string());
        }
        out.push(String::new());
    }

    for (req, seen) in REQUIREMENTS.iter().zip(seen) {
        if !seen {
            out.push(req.section.to_string());
            out.push(req.default_line().to_string());
        }
    }
    out
}

/// Looks up `key` in `section`, returning the text after `key=`.
pub fn get_setting(lines: &[String], section: &str, key: &str) -> Option<String> {
    let prefix = format!("{key}=");
    section_lines(lines, section)?
        .iter()
        .find_map(|line| line.strip_prefix(&prefix))
        .map(str::to_string)
}

pub struct JtsIni {
    path: PathBuf,
}

impl JtsIni {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> JtsIniError {
        JtsIniError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// `None` when the file does not exist yet.
    pub fn read_lines(&self) -> Result<Option<Vec<String>>, JtsIniError> {
        if self.path.is_dir() {
            return Err(JtsIniError::InvalidPath(self.path.clone()));
        }
        if !self.path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        Ok(Some(text.lines().map(str::to_string).collect()))
    }

    pub fn ensure_valid(&self) -> Result<JtsIniOutcome, JtsIniError> {
        let path = self.path.display();
        let Some(lines) = self.read_lines()? else {
            info!(%path, "creating minimal jts.ini");
            self.write(&repair(&[]))?;
            return Ok(JtsIniOutcome::Created);
        };

        if is_valid(&lines) {
            info!(%path, "jts.ini contains the required settings");
            return Ok(JtsIniOutcome::AlreadyValid);
        }
        info!(%path, "jts.ini is missing required settings; rewriting");
        self.write(&repair(&lines))?;
        Ok(JtsIniOutcome::Rewritten)
    }

    fn write(&self, lines: &[String]) -> Result<(), JtsIniError> {
        let mut text = String::new();
        for line in lines {
            debug!(%line, "jts.ini");
            text.push_str(line);
            text.push('\n');
        }
        std::fs::write(&self.path, text).map_err(|e| self.io_error(e))
    }
}
