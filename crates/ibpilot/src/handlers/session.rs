use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Local, Timelike};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::ExistingSessionPolicy;
use crate::dispatcher::WindowEventKind;
use crate::errors::AutomationError;
use crate::executor::Lane;
use crate::handoff::{NamedWindow, NamedWindows};
use crate::ui::{ensure_toggle, KeyChord, Scope, UiFacade, WindowKind, WindowRef};

use super::WindowHandler;

/// The daily auto-logoff settings window.
pub struct ExitSessionHandler {
    auto_closedown: bool,
    window: Mutex<Option<WindowRef>>,
}

impl ExitSessionHandler {
    pub fn new(auto_closedown: bool) -> Self {
        Self {
            auto_closedown,
            window: Mutex::new(None),
        }
    }

    pub fn cached_window(&self) -> Option<WindowRef> {
        *self.window.lock()
    }
}

/// `hh:mm` on a 12 hour clock plus the AM/PM toggle caption.
pub(crate) fn logoff_time_fields(time: chrono::NaiveTime) -> (String, &'static str) {
    let (pm, hour) = time.hour12();
    let meridiem = if pm { "PM" } else { "AM" };
    (format!("{:02}:{:02}", hour, time.minute()), meridiem)
}

impl WindowHandler for ExitSessionHandler {
    fn name(&self) -> &'static str {
        "ExitSession"
    }

    fn filter_event(&self, kind: WindowEventKind) -> bool {
        matches!(kind, WindowEventKind::Opened | WindowEventKind::Activated)
    }

    /// The settings window is reused and its title changes once shown, so a
    /// window seen before is recognised by identity.
    fn recognize_window(&self, ui: &dyn UiFacade, window: WindowRef) -> bool {
        if self.cached_window() == Some(window) {
            return true;
        }
        ui.window_kind(window) != WindowKind::Other && ui.title_contains(window, "Exit Session Setting")
    }

    fn handle_window(
        &self,
        lane: &Lane<'_>,
        window: WindowRef,
        _kind: WindowEventKind,
    ) -> Result<(), AutomationError> {
        *self.window.lock() = Some(window);
        if self.auto_closedown {
            return Ok(());
        }

        let ui = lane.ui();
        let logoff = (Local::now() - ChronoDuration::minutes(5)).time();
        let (text, meridiem) = logoff_time_fields(logoff);

        let field = ui
            .find_text_field(Scope::Window(window), 0)
            .ok_or_else(|| AutomationError::not_found("auto-logoff time field"))?;
        ui.set_text(field, &text);
        ensure_toggle(ui, window, meridiem)?;
        if !ui.click_button(window, "Update") {
            return Err(AutomationError::not_found("Update button"));
        }
        info!(time = %text, meridiem, "auto-logoff time moved out of the way");
        Ok(())
    }
}

pub struct ExistingSessionDetectedHandler {
    policy: ExistingSessionPolicy,
}

impl ExistingSessionDetectedHandler {
    pub fn new(policy: ExistingSessionPolicy) -> Self {
        Self { policy }
    }
}

impl WindowHandler for ExistingSessionDetectedHandler {
    fn name(&self) -> &'static str {
        "ExistingSessionDetected"
    }

    fn filter_event(&self, kind: WindowEventKind) -> bool {
        kind == WindowEventKind::Opened
    }

    fn recognize_window(&self, ui: &dyn UiFacade, window: WindowRef) -> bool {
        ui.window_kind(window) == WindowKind::Dialog
            && ui.title_contains(window, "Existing session detected")
    }

    fn handle_window(
        &self,
        lane: &Lane<'_>,
        window: WindowRef,
        _kind: WindowEventKind,
    ) -> Result<(), AutomationError> {
        let ui = lane.ui();
        let captions: &[&str] = match self.policy {
            ExistingSessionPolicy::Manual => {
                info!("existing session left for manual decision");
                return Ok(());
            }
            ExistingSessionPolicy::Primary => &["Continue Login", "OK"],
            ExistingSessionPolicy::Secondary => &["Cancel", "Exit Application"],
        };
        match captions.iter().find(|caption| ui.click_button(window, caption)) {
            Some(caption) => {
                info!(policy = ?self.policy, button = *caption, "existing session answered");
                Ok(())
            }
            None => Err(AutomationError::not_found(format!("any of {captions:?} buttons"))),
        }
    }
}

/// "System not currently available" during login: acknowledge it and close
/// the login frame so the outer supervisor can retry later.
pub struct NotCurrentlyAvailableHandler {
    windows: Arc<NamedWindows>,
}

impl NotCurrentlyAvailableHandler {
    pub fn new(windows: Arc<NamedWindows>) -> Self {
        Self { windows }
    }
}

impl WindowHandler for NotCurrentlyAvailableHandler {
    fn name(&self) -> &'static str {
        "NotCurrentlyAvailable"
    }

    fn filter_event(&self, kind: WindowEventKind) -> bool {
        matches!(kind, WindowEventKind::Opened | WindowEventKind::Activated)
    }

    fn recognize_window(&self, ui: &dyn UiFacade, window: WindowRef) -> bool {
        ui.window_kind(window) == WindowKind::Dialog
            && ui.title_contains(window, "Login")
            && ui.find_label(window, "not currently available").is_some()
    }

    fn handle_window(
        &self,
        lane: &Lane<'_>,
        window: WindowRef,
        _kind: WindowEventKind,
    ) -> Result<(), AutomationError> {
        let ui = lane.ui();
        if !ui.click_button(window, "OK") {
            warn!("the system is not currently available");
            return Err(AutomationError::not_found("OK button"));
        }
        match self.windows.get(NamedWindow::LoginFrame) {
            Some(login) => {
                ui.send_keystroke(login, KeyChord::alt_f4());
                info!(%login, "closing login frame after unavailable notice");
            }
            None => debug!("no login frame recorded; nothing to close"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::logoff_time_fields;

    fn at(hour: u32, minute: u32) -> (String, &'static str) {
        logoff_time_fields(NaiveTime::from_hms_opt(hour, minute, 0).unwrap())
    }

    #[test]
    fn test_logoff_time_uses_twelve_hour_clock() {
        assert_eq!(at(0, 5), ("12:05".to_string(), "AM"));
        assert_eq!(at(9, 30), ("09:30".to_string(), "AM"));
        assert_eq!(at(12, 0), ("12:00".to_string(), "PM"));
        assert_eq!(at(23, 55), ("11:55".to_string(), "PM"));
    }
}
