use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::settings::ConfigError;

#[derive(Error, Debug)]
pub enum AutomationError {
    /// A named UI element could not be located in the target window.
    #[error("could not find {0}")]
    ElementNotFound(String),

    /// The window was found but its content is not what the interaction expects.
    #[error("{0}")]
    InvalidState(String),

    /// A named window did not appear within the caller's deadline.
    #[error("{0} not available")]
    NotAvailable(String),

    /// The UI lane dropped the task before it produced a result.
    #[error("UI task aborted: {0}")]
    TaskAborted(String),

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AutomationError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::ElementNotFound(what.into())
    }

    /// Errors that only abort the current handler invocation or command.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration(_) | Self::Io { .. })
    }
}

/// Non-zero process exit codes. Any of them is fatal and not retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    Configuration,
    InvalidJtsIniPath,
    JtsIniIo,
    SettingsIo,
    SecondFactorClosedTooQuickly,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        match self {
            ExitCode::Configuration => 1,
            ExitCode::InvalidJtsIniPath => 1101,
            ExitCode::JtsIniIo => 1102,
            ExitCode::SettingsIo => 1103,
            ExitCode::SecondFactorClosedTooQuickly => 999,
        }
    }
}

/// Invoked when the automation can no longer continue safely.
pub type ExitHook = Arc<dyn Fn(ExitCode) + Send + Sync>;

/// Hook that terminates the process.
pub fn process_exit_hook() -> ExitHook {
    Arc::new(|code: ExitCode| {
        error!(?code, status = code.code(), "exiting");
        std::process::exit(code.code());
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes = [
            ExitCode::Configuration,
            ExitCode::InvalidJtsIniPath,
            ExitCode::JtsIniIo,
            ExitCode::SettingsIo,
            ExitCode::SecondFactorClosedTooQuickly,
        ]
        .map(ExitCode::code);
        for (i, a) in codes.iter().enumerate() {
            assert_ne!(*a, 0);
            assert!(codes[i + 1..].iter().all(|b| b != a));
        }
    }

    #[test]
    fn test_error_display() {
        let err = AutomationError::not_found("Enable ActiveX checkbox");
        assert_eq!(err.to_string(), "could not find Enable ActiveX checkbox");

        let err = AutomationError::NotAvailable("main window".to_string());
        assert_eq!(err.to_string(), "main window not available");
    }

    #[test]
    fn test_fatal_errors_are_not_recoverable() {
        let io = AutomationError::Io {
            path: PathBuf::from("jts.ini"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!io.is_recoverable());
        assert!(io.to_string().contains("jts.ini"));
        assert!(AutomationError::not_found("OK button").is_recoverable());
    }
}
