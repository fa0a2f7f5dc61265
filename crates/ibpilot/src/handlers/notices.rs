use tracing::{info, warn};

use crate::dispatcher::WindowEventKind;
use crate::errors::AutomationError;
use crate::executor::Lane;
use crate::ui::{describe, ensure_check_box, UiFacade, WindowKind, WindowRef};

use super::WindowHandler;

/// How a notice gets out of the way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dismiss {
    /// Click the first enabled button among the captions.
    Click(&'static [&'static str]),
    Hide,
}

/// Recognises a window by kind plus title and/or label text and dismisses it.
#[derive(Debug, Clone)]
pub struct NoticeHandler {
    name: &'static str,
    kind: WindowKind,
    title: Option<&'static str>,
    label: Option<&'static str>,
    dismiss: Dismiss,
    enabled: bool,
}

impl NoticeHandler {
    pub fn new(name: &'static str, kind: WindowKind, dismiss: Dismiss) -> Self {
        Self {
            name,
            kind,
            title: None,
            label: None,
            dismiss,
            enabled: true,
        }
    }

    pub fn with_title(mut self, title: &'static str) -> Self {
        self.title = Some(title);
        self
    }

    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    /// A disabled notice is still recognised, so it shadows later handlers,
    /// but is left on screen.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl WindowHandler for NoticeHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    fn filter_event(&self, kind: WindowEventKind) -> bool {
        kind == WindowEventKind::Opened
    }

    fn recognize_window(&self, ui: &dyn UiFacade, window: WindowRef) -> bool {
        if ui.window_kind(window) != self.kind {
            return false;
        }
        if let Some(title) = self.title {
            if !ui.title_contains(window, title) {
                return false;
            }
        }
        if let Some(label) = self.label {
            if ui.find_label(window, label).is_none() {
                return false;
            }
        }
        self.title.is_some() || self.label.is_some()
    }

    fn handle_window(
        &self,
        lane: &Lane<'_>,
        window: WindowRef,
        _kind: WindowEventKind,
    ) -> Result<(), AutomationError> {
        let ui = lane.ui();
        if !self.enabled {
            info!(handler = self.name, title = %describe(ui, window), "leaving notice for the user");
            return Ok(());
        }
        match self.dismiss {
            Dismiss::Hide => ui.set_visible(window, false),
            Dismiss::Click(captions) => {
                let clicked = captions
                    .iter()
                    .find(|caption| ui.click_button(window, caption))
                    .ok_or_else(|| AutomationError::not_found(format!("any of {captions:?} buttons")))?;
                info!(handler = self.name, button = *clicked, "notice dismissed");
                return Ok(());
            }
        }
        info!(handler = self.name, "notice hidden");
        Ok(())
    }
}

pub fn blind_trading_warning() -> NoticeHandler {
    NoticeHandler::new("BlindTradingWarning", WindowKind::Dialog, Dismiss::Click(&["Yes"]))
        .with_title("Warning")
        .with_label("Blind Trading")
}

pub fn newer_version() -> NoticeHandler {
    NoticeHandler::new("NewerVersionDialog", WindowKind::Dialog, Dismiss::Click(&["No", "OK"]))
        .with_label("newer version")
}

/// Newer builds announce updates in a frame rather than a dialog.
pub fn newer_version_frame() -> NoticeHandler {
    NoticeHandler::new("NewerVersionFrame", WindowKind::Frame, Dismiss::Click(&["No", "OK"]))
        .with_label("newer version")
}

/// Raised after the session is dropped; answering it starts a fresh login.
pub fn relogin() -> NoticeHandler {
    NoticeHandler::new("ReloginDialog", WindowKind::Dialog, Dismiss::Click(&["Re-login"]))
        .with_title("Re-login is required")
}

pub fn tip_of_the_day() -> NoticeHandler {
    NoticeHandler::new("TipOfTheDay", WindowKind::Dialog, Dismiss::Click(&["Close"]))
        .with_title("Tip of the Day")
}

pub fn nse_compliance(dismiss: bool) -> NoticeHandler {
    NoticeHandler::new("NSECompliance", WindowKind::Frame, Dismiss::Hide)
        .with_title("NSE Compliance")
        .enabled(dismiss)
}

pub fn password_expiry_warning(dismiss: bool) -> NoticeHandler {
    NoticeHandler::new("PasswordExpiryWarning", WindowKind::Frame, Dismiss::Click(&["OK", "Close"]))
        .with_title("Password Expiry Notification")
        .enabled(dismiss)
}

const DONT_DISPLAY_AGAIN: &str = "Don't display this message again.";

/// Order precautions shown by the demo system when API access is enabled there.
pub struct DemoOrderPrecautionsHandler {
    enabled: bool,
}

impl DemoOrderPrecautionsHandler {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl WindowHandler for DemoOrderPrecautionsHandler {
    fn name(&self) -> &'static str {
        "DemoOrderPrecautions"
    }

    fn filter_event(&self, kind: WindowEventKind) -> bool {
        kind == WindowEventKind::Opened
    }

    fn recognize_window(&self, ui: &dyn UiFacade, window: WindowRef) -> bool {
        self.enabled
            && ui.window_kind(window) == WindowKind::Dialog
            && ui.title_contains(window, "IB TWS (Demo System)")
            && ui.find_check_box(window, DONT_DISPLAY_AGAIN).is_some()
    }

    fn handle_window(
        &self,
        lane: &Lane<'_>,
        window: WindowRef,
        _kind: WindowEventKind,
    ) -> Result<(), AutomationError> {
        let ui = lane.ui();
        ensure_check_box(ui, window, DONT_DISPLAY_AGAIN, true)?;
        if !ui.click_button(window, "OK") {
            warn!(title = %describe(ui, window), "order precautions: OK button unavailable");
            return Err(AutomationError::not_found("OK button"));
        }
        info!("order precautions auto-clicked");
        Ok(())
    }
}
