use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::config::{ApiSettings, AppMode};
use crate::errors::AutomationError;
use crate::ui::{ensure_check_box, Scope, UiFacade, WindowRef};

use super::{select_api_section, ConfigurationAction};

pub(crate) const ENABLE_API_CHECKBOX: &str = "Enable ActiveX and Socket Clients";

/// ENABLEAPI: ticks the socket clients checkbox if needed. Produces the ack text.
pub struct EnableApi;

impl ConfigurationAction for EnableApi {
    type Output = String;

    const NAME: &'static str = "enable-api";

    fn configure(self, ui: &dyn UiFacade, dialog: WindowRef) -> Result<String, AutomationError> {
        select_api_section(ui, dialog)?;
        let check_box = ui
            .find_check_box(dialog, ENABLE_API_CHECKBOX)
            .ok_or_else(|| AutomationError::not_found("Enable ActiveX checkbox"))?;

        if ui.is_selected(check_box) {
            ui.set_visible(dialog, false);
            info!("API connections already enabled");
            return Ok("already configured".to_string());
        }

        ui.click(check_box);
        if !ui.click_button(dialog, "OK") {
            return Err(AutomationError::not_found("OK button"));
        }
        info!("configured to accept API connections");
        Ok("configured".to_string())
    }
}

/// Applies `ForceTwsApiPort`, `ReadOnlyApi` and `AllowExternalIps` after startup.
pub struct ApplyApiSettings {
    pub settings: ApiSettings,
    pub mode: AppMode,
    pub api_change_expected: Arc<AtomicBool>,
}

impl ApplyApiSettings {
    fn set_port(&self, ui: &dyn UiFacade, dialog: WindowRef) -> Result<(), AutomationError> {
        let port = self.settings.force_port;
        let container = ui
            .find_component(dialog, "Socket port")
            .ok_or_else(|| AutomationError::not_found("socket port component"))?;
        let field = ui
            .find_text_field(Scope::Component(container), 0)
            .ok_or_else(|| AutomationError::not_found("socket port field"))?;

        let current = ui.get_text(field).unwrap_or_default();
        if current.trim().parse::<u16>().ok() == Some(port) {
            info!(port, "API socket port already set");
            return Ok(());
        }

        if self.mode == AppMode::Tws {
            let enabled = ui
                .find_check_box(dialog, ENABLE_API_CHECKBOX)
                .ok_or_else(|| AutomationError::not_found("Enable ActiveX checkbox"))?;
            if ui.is_selected(enabled) {
                self.api_change_expected.store(true, Ordering::SeqCst);
            }
        }
        ui.set_text(field, &port.to_string());
        info!(from = %current, to = port, "API socket port changed");
        Ok(())
    }
}

impl ConfigurationAction for ApplyApiSettings {
    type Output = ();

    const NAME: &'static str = "apply-api-settings";

    fn configure(self, ui: &dyn UiFacade, dialog: WindowRef) -> Result<(), AutomationError> {
        select_api_section(ui, dialog)?;
        if self.settings.force_port != 0 {
            self.set_port(ui, dialog)?;
        }
        if let Some(read_only) = self.settings.read_only_api {
            let changed = ensure_check_box(ui, dialog, "Read-Only API", read_only)?;
            info!(read_only, changed, "Read-Only API setting applied");
        }
        if let Some(allow) = self.settings.allow_external_ips {
            let changed = ensure_check_box(ui, dialog, "Allow connections from localhost only", !allow)?;
            info!(allow_external_ips = allow, changed, "external connection setting applied");
        }
        if !ui.click_button(dialog, "OK") {
            return Err(AutomationError::not_found("OK button"));
        }
        ui.set_visible(dialog, false);
        Ok(())
    }
}
