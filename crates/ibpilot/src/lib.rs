//! Unattended operation of a trading workstation's desktop UI
//!
//! The host process observes the workstation's windows and forwards every
//! window event to a [`WindowEventDispatcher`]. Each event is classified by an
//! ordered chain of [`WindowHandler`]s and handled on a single serialized UI
//! lane. A line-based TCP command channel lets operators reconfigure, reconnect
//! or stop the workstation remotely.

pub mod bootstrap;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod executor;
pub mod handlers;
pub mod handoff;
pub mod jts_ini;
pub mod login;
pub mod protocol;
pub mod server;
pub mod settings;
pub mod shutdown;
pub mod tasks;
#[cfg(test)]
mod tests;
pub mod ui;

pub use bootstrap::{Controller, StartupError};
pub use config::{AppMode, AutomationConfig, ServerConfig};
pub use dispatcher::{WindowEvent, WindowEventDispatcher, WindowEventKind};
pub use errors::{process_exit_hook, AutomationError, ExitCode, ExitHook};
pub use executor::{Lane, LaneHandle, UiExecutor};
pub use handlers::{HandlerRegistry, WindowHandler};
pub use handoff::{NamedWindow, NamedWindows};
pub use protocol::{Command, ProtocolError};
pub use server::{CommandChannel, CommandServer};
pub use settings::{ConfigError, Settings, SettingsProvider};
pub use tokio_util::sync::CancellationToken;
pub use ui::{ComponentRef, KeyChord, Scope, UiFacade, WindowKind, WindowRef};
