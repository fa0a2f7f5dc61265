//! Read-only key/value settings with typed accessors.
//!
//! The on-disk format is the plain `key=value` layout the workstation tooling
//! has always used: one entry per line, `#` or `!` starts a comment. Keys are
//! trimmed; a value loses only its leading whitespace. Values are written with
//! properties-style escapes (`\\`, `\n`, `\r`, `\t` and `\ ` for a leading
//! space) so every string survives a save and load. Any other backslash is
//! kept as written, which leaves Windows paths alone.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value '{value}' for setting {key}: expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("cannot access settings file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub fn invalid(key: &str, value: &str, expected: &'static str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected,
        }
    }
}

/// Typed lookups used by handlers and the startup code.
pub trait SettingsProvider: Send + Sync {
    fn get_string(&self, key: &str, default: &str) -> String;

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, ConfigError>;

    fn get_int(&self, key: &str, default: i64) -> Result<i64, ConfigError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded settings file");
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let mut values = BTreeMap::new();
        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim_start();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) => {
                    values.insert(key.trim().to_string(), unescape(value.trim_start()));
                }
                None => warn!(line = number + 1, "ignoring settings line without '='"),
            }
        }
        Self { values }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        std::fs::write(path, self.render()).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.values {
            let _ = writeln!(out, "{key}={}", escape(value));
        }
        out
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn set_string(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set_string(key, if value { "yes" } else { "no" });
    }

    pub fn set_int(&mut self, key: &str, value: i64) {
        self.set_string(key, value.to_string());
    }

    fn non_empty(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}

impl SettingsProvider for Settings {
    fn get_string(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        let Some(value) = self.non_empty(key) else {
            return Ok(default);
        };
        parse_bool(value).ok_or_else(|| ConfigError::invalid(key, value, "yes/no or true/false"))
    }

    fn get_int(&self, key: &str, default: i64) -> Result<i64, ConfigError> {
        let Some(value) = self.non_empty(key) else {
            return Ok(default);
        };
        value
            .parse()
            .map_err(|_| ConfigError::invalid(key, value, "an integer"))
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut leading = true;
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ' ' if leading => out.push_str("\\ "),
            c => out.push(c),
        }
        leading &= c == ' ' || c == '\t';
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(' ') => out.push(' '),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" => Some(true),
        "no" | "false" => Some(false),
        _ => None,
    }
}
