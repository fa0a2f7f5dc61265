//! Routes raw window events to the first handler that claims them.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::errors::{AutomationError, ExitCode, ExitHook};
use crate::executor::{panic_message, Lane, UiExecutor};
use crate::handlers::HandlerRegistry;
use crate::handoff::NamedWindows;
use crate::ui::{describe, WindowRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowEventKind {
    Opened,
    Closing,
    Closed,
    Activated,
    Deactivated,
    Iconified,
    Deiconified,
}

impl fmt::Display for WindowEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEvent {
    pub window: WindowRef,
    pub kind: WindowEventKind,
}

/// Entry point for the host's window-event listener.
#[derive(Clone)]
pub struct WindowEventDispatcher {
    registry: HandlerRegistry,
    executor: UiExecutor,
    windows: Arc<NamedWindows>,
    exit: ExitHook,
}

impl WindowEventDispatcher {
    pub fn new(
        registry: HandlerRegistry,
        executor: UiExecutor,
        windows: Arc<NamedWindows>,
        exit: ExitHook,
    ) -> Self {
        Self {
            registry,
            executor,
            windows,
            exit,
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Queues one lane turn that classifies and handles the event. Never blocks.
    pub fn on_event(&self, window: WindowRef, kind: WindowEventKind) {
        let dispatcher = self.clone();
        self.executor.submit("window-event", move |lane| {
            dispatcher.dispatch(lane, WindowEvent { window, kind });
        });
    }

    /// Runs the handler chain for `event` on the current lane turn.
    /// Returns the name of the handler that claimed it, if any.
    pub fn dispatch(&self, lane: &Lane<'_>, event: WindowEvent) -> Option<&'static str> {
        let ui = lane.ui();
        let WindowEvent { window, kind } = event;

        for handler in self.registry.iter() {
            if !handler.filter_event(kind) {
                continue;
            }

            let recognized = catch_unwind(AssertUnwindSafe(|| handler.recognize_window(ui, window)));
            match recognized {
                Ok(true) => {}
                Ok(false) => continue,
                Err(panic) => {
                    error!(
                        handler = handler.name(),
                        reason = %panic_message(panic.as_ref()),
                        "window recognition panicked"
                    );
                    continue;
                }
            }

            let title = describe(ui, window);
            debug!(handler = handler.name(), %title, event = %kind, "window recognized");

            if let Some(name) = handler.provides() {
                self.windows.fulfil(name, window);
            }

            match catch_unwind(AssertUnwindSafe(|| handler.handle_window(lane, window, kind))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => self.report(handler.name(), &title, err),
                Err(panic) => error!(
                    handler = handler.name(),
                    %title,
                    reason = %panic_message(panic.as_ref()),
                    "window handler panicked"
                ),
            }
            return Some(handler.name());
        }
        None
    }

    fn report(&self, handler: &'static str, title: &str, err: AutomationError) {
        if err.is_recoverable() {
            warn!(handler, %title, error = %err, "window handler failed");
            return;
        }
        error!(handler, %title, error = %err, "fatal error while handling window");
        let code = match err {
            AutomationError::Io { .. } => ExitCode::SettingsIo,
            _ => ExitCode::Configuration,
        };
        info!(?code, "requesting shutdown");
        (self.exit)(code);
    }
}
