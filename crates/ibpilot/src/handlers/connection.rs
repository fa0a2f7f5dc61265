use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::config::IncomingConnectionPolicy;
use crate::dispatcher::WindowEventKind;
use crate::errors::{AutomationError, ExitCode, ExitHook};
use crate::executor::Lane;
use crate::ui::{UiFacade, WindowKind, WindowRef};

use super::WindowHandler;

fn is_dialog(ui: &dyn UiFacade, window: WindowRef) -> bool {
    ui.window_kind(window) == WindowKind::Dialog
}

pub struct AcceptIncomingConnectionHandler {
    policy: IncomingConnectionPolicy,
}

impl AcceptIncomingConnectionHandler {
    pub fn new(policy: IncomingConnectionPolicy) -> Self {
        Self { policy }
    }
}

impl WindowHandler for AcceptIncomingConnectionHandler {
    fn name(&self) -> &'static str {
        "AcceptIncomingConnection"
    }

    fn filter_event(&self, kind: WindowEventKind) -> bool {
        kind == WindowEventKind::Opened
    }

    fn recognize_window(&self, ui: &dyn UiFacade, window: WindowRef) -> bool {
        is_dialog(ui, window) && ui.find_label(window, "Accept incoming connection").is_some()
    }

    fn handle_window(
        &self,
        lane: &Lane<'_>,
        window: WindowRef,
        _kind: WindowEventKind,
    ) -> Result<(), AutomationError> {
        let ui = lane.ui();
        let clicked = match self.policy {
            IncomingConnectionPolicy::Manual => {
                info!("incoming API connection left for manual decision");
                return Ok(());
            }
            IncomingConnectionPolicy::Accept => {
                ui.click_button(window, "OK") || ui.click_button(window, "Yes")
            }
            IncomingConnectionPolicy::Reject => ui.click_button(window, "No"),
        };
        if !clicked {
            return Err(AutomationError::not_found(
                "the button to answer the incoming connection",
            ));
        }
        info!(policy = ?self.policy, "incoming API connection answered");
        Ok(())
    }
}

/// Confirms the API restart prompt raised by a port change we made ourselves.
pub struct ApiChangeConfirmationHandler {
    expected: std::sync::Arc<AtomicBool>,
}

impl ApiChangeConfirmationHandler {
    pub fn new(expected: std::sync::Arc<AtomicBool>) -> Self {
        Self { expected }
    }
}

impl WindowHandler for ApiChangeConfirmationHandler {
    fn name(&self) -> &'static str {
        "ApiChangeConfirmation"
    }

    fn filter_event(&self, kind: WindowEventKind) -> bool {
        kind == WindowEventKind::Opened
    }

    fn recognize_window(&self, ui: &dyn UiFacade, window: WindowRef) -> bool {
        self.expected.load(Ordering::SeqCst)
            && is_dialog(ui, window)
            && ui.title_contains(window, "Configuration Change Confirmation")
    }

    fn handle_window(
        &self,
        lane: &Lane<'_>,
        window: WindowRef,
        _kind: WindowEventKind,
    ) -> Result<(), AutomationError> {
        if !lane.ui().click_button(window, "Yes") {
            return Err(AutomationError::not_found("Yes button"));
        }
        self.expected.store(false, Ordering::SeqCst);
        info!("API configuration change confirmed");
        Ok(())
    }
}

pub struct SecurityCodeHandler {
    read_only_login: bool,
}

impl SecurityCodeHandler {
    pub fn new(read_only_login: bool) -> Self {
        Self { read_only_login }
    }
}

impl WindowHandler for SecurityCodeHandler {
    fn name(&self) -> &'static str {
        "SecurityCode"
    }

    fn filter_event(&self, kind: WindowEventKind) -> bool {
        kind == WindowEventKind::Opened
    }

    fn recognize_window(&self, ui: &dyn UiFacade, window: WindowRef) -> bool {
        is_dialog(ui, window) && ui.find_label(window, "Enter security code").is_some()
    }

    fn handle_window(
        &self,
        lane: &Lane<'_>,
        window: WindowRef,
        _kind: WindowEventKind,
    ) -> Result<(), AutomationError> {
        if !self.read_only_login {
            return Ok(());
        }
        if !lane.ui().click_button(window, "Enter Read Only") {
            return Err(AutomationError::not_found("Enter Read Only button"));
        }
        info!("initiating read-only login");
        Ok(())
    }
}

pub const SECOND_FACTOR_MIN_LIFETIME: Duration = Duration::from_secs(3);

/// Exits when the second-factor prompt disappears before a human could have
/// answered it.
pub struct SecondFactorAuthenticationHandler {
    opened_at: Mutex<Option<Instant>>,
    exit: ExitHook,
}

impl SecondFactorAuthenticationHandler {
    pub fn new(exit: ExitHook) -> Self {
        Self {
            opened_at: Mutex::new(None),
            exit,
        }
    }
}

impl WindowHandler for SecondFactorAuthenticationHandler {
    fn name(&self) -> &'static str {
        "SecondFactorAuthentication"
    }

    fn filter_event(&self, kind: WindowEventKind) -> bool {
        matches!(kind, WindowEventKind::Opened | WindowEventKind::Closed)
    }

    fn recognize_window(&self, ui: &dyn UiFacade, window: WindowRef) -> bool {
        is_dialog(ui, window) && ui.title_contains(window, "Second Factor Authentication")
    }

    fn handle_window(
        &self,
        _lane: &Lane<'_>,
        _window: WindowRef,
        kind: WindowEventKind,
    ) -> Result<(), AutomationError> {
        match kind {
            WindowEventKind::Opened => {
                *self.opened_at.lock() = Some(Instant::now());
                info!("second factor authentication requested");
            }
            WindowEventKind::Closed => {
                let Some(opened) = self.opened_at.lock().take() else {
                    warn!("second factor dialog closed without being seen to open");
                    return Ok(());
                };
                let open_for = opened.elapsed();
                if open_for < SECOND_FACTOR_MIN_LIFETIME {
                    error!(?open_for, "second factor dialog closed too quickly");
                    (self.exit)(ExitCode::SecondFactorClosedTooQuickly);
                }
            }
            _ => {}
        }
        Ok(())
    }
}
