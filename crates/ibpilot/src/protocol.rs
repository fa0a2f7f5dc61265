//! The line-oriented command protocol.
//!
//! ```text
//! client: VERB [ARG ...]\n
//! server: (INFO <text>\n)* (OK <text>|ERROR <text>)\n
//! ```

use std::fmt;

use thiserror::Error;

/// Longest accepted command line, newline included.
pub const MAX_LINE_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    EnableApi,
    ReconnectAccount,
    ReconnectData,
    Stop,
    Exit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown command")]
    UnknownCommand(String),

    #[error("invalid command line")]
    InvalidLine,
}

impl Command {
    /// Parses one line. Verbs are case-sensitive; extra arguments are ignored.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let verb = line.split_whitespace().next().ok_or(ProtocolError::InvalidLine)?;
        match verb {
            "ENABLEAPI" => Ok(Command::EnableApi),
            "RECONNECTACCOUNT" => Ok(Command::ReconnectAccount),
            "RECONNECTDATA" => Ok(Command::ReconnectData),
            "STOP" => Ok(Command::Stop),
            "EXIT" => Ok(Command::Exit),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Command::EnableApi => "ENABLEAPI",
            Command::ReconnectAccount => "RECONNECTACCOUNT",
            Command::ReconnectData => "RECONNECTDATA",
            Command::Stop => "STOP",
            Command::Exit => "EXIT",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Info,
    Ok,
    Error,
}

impl ResponseKind {
    pub fn tag(self) -> &'static str {
        match self {
            ResponseKind::Info => "INFO",
            ResponseKind::Ok => "OK",
            ResponseKind::Error => "ERROR",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ResponseKind::Info)
    }
}

/// Renders one response line, newline included. Embedded CR/LF become spaces.
pub fn format_response(kind: ResponseKind, text: &str) -> String {
    let text = text.replace(['\r', '\n'], " ");
    if text.is_empty() {
        format!("{}\n", kind.tag())
    } else {
        format!("{} {}\n", kind.tag(), text)
    }
}

/// Splits a received response line into its kind and text.
pub fn parse_response(line: &str) -> Option<(ResponseKind, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (tag, text) = line.split_once(' ').unwrap_or((line, ""));
    let kind = match tag {
        "INFO" => ResponseKind::Info,
        "OK" => ResponseKind::Ok,
        "ERROR" => ResponseKind::Error,
        _ => return None,
    };
    Some((kind, text))
}
