//! The two login window shapes: TWS and the API Gateway.

use tracing::{debug, info};

use crate::config::{AutomationConfig, TradingMode};
use crate::errors::AutomationError;
use crate::handlers::frames::is_gateway_title;
use crate::ui::{ensure_check_box, ensure_toggle, ComponentRef, UiFacade, WindowKind, WindowRef};

/// One text field the machine fills in, by tab order within the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialField {
    pub label: &'static str,
    pub index: usize,
    pub value: String,
}

impl CredentialField {
    fn new(label: &'static str, index: usize, value: &str) -> Self {
        Self {
            label,
            index,
            value: value.to_string(),
        }
    }
}

pub trait LoginForm: Send + Sync + 'static {
    fn recognize(&self, ui: &dyn UiFacade, window: WindowRef) -> bool;

    /// Puts the window into the configured login mode.
    fn initialise(
        &self,
        ui: &dyn UiFacade,
        window: WindowRef,
        config: &AutomationConfig,
    ) -> Result<(), AutomationError>;

    /// Every field that must be non-empty before logging in, in fill order.
    fn credential_fields(&self, config: &AutomationConfig) -> Vec<CredentialField>;

    /// Login button captions, tried in order.
    fn login_captions(&self) -> &'static [&'static str];

    fn login_button(&self, ui: &dyn UiFacade, window: WindowRef) -> Option<ComponentRef> {
        self.login_captions()
            .iter()
            .find_map(|caption| ui.find_button(window, caption))
    }
}

fn has_login_button(form: &dyn LoginForm, ui: &dyn UiFacade, window: WindowRef) -> bool {
    form.login_button(ui, window).is_some()
}

fn select_trading_mode(
    ui: &dyn UiFacade,
    window: WindowRef,
    mode: TradingMode,
) -> Result<(), AutomationError> {
    let caption = match mode {
        TradingMode::Live => "Live Trading",
        TradingMode::Paper => "Paper Trading",
    };
    info!(?mode, "setting trading mode");
    ensure_toggle(ui, window, caption)
}

pub struct TwsLoginForm;

impl LoginForm for TwsLoginForm {
    fn recognize(&self, ui: &dyn UiFacade, window: WindowRef) -> bool {
        ui.window_kind(window) == WindowKind::Frame
            && ui.title_contains(window, "Login")
            && has_login_button(self, ui, window)
    }

    fn initialise(
        &self,
        ui: &dyn UiFacade,
        window: WindowRef,
        config: &AutomationConfig,
    ) -> Result<(), AutomationError> {
        // Older builds have no trading mode toggles on this frame.
        if ui.find_toggle_button(window, "Live Trading").is_some() {
            select_trading_mode(ui, window, config.login.trading_mode)?;
        } else {
            debug!("login frame has no trading mode toggles");
        }
        if let Some(store) = config.login.store_settings_on_server {
            ensure_check_box(ui, window, "Use/store settings on server", store)?;
        }
        Ok(())
    }

    fn credential_fields(&self, config: &AutomationConfig) -> Vec<CredentialField> {
        let (user, password) = config.ibapi_credentials();
        vec![
            CredentialField::new("IB user name", 0, user),
            CredentialField::new("IB password", 1, password),
        ]
    }

    fn login_captions(&self) -> &'static [&'static str] {
        &["Login", "Paper Log In"]
    }
}

pub struct GatewayLoginForm;

impl LoginForm for GatewayLoginForm {
    fn recognize(&self, ui: &dyn UiFacade, window: WindowRef) -> bool {
        ui.window_kind(window) == WindowKind::Frame
            && is_gateway_title(ui, window)
            && has_login_button(self, ui, window)
    }

    fn initialise(
        &self,
        ui: &dyn UiFacade,
        window: WindowRef,
        config: &AutomationConfig,
    ) -> Result<(), AutomationError> {
        let api = if config.login.fix { "FIX CTCI" } else { "IB API" };
        ensure_toggle(ui, window, api)?;
        select_trading_mode(ui, window, config.login.trading_mode)
    }

    fn credential_fields(&self, config: &AutomationConfig) -> Vec<CredentialField> {
        let (api_user, api_password) = config.ibapi_credentials();
        if !config.login.fix {
            return vec![
                CredentialField::new("IBAPI user name", 0, api_user),
                CredentialField::new("IBAPI password", 1, api_password),
            ];
        }

        let (fix_user, fix_password) = config.fix_credentials();
        let mut fields = vec![
            CredentialField::new("FIX user name", 0, fix_user),
            CredentialField::new("FIX password", 1, fix_password),
        ];
        // The IBAPI pair is optional in FIX mode, but all or nothing.
        if !api_user.is_empty() || !api_password.is_empty() {
            fields.push(CredentialField::new("IBAPI user name", 3, api_user));
            fields.push(CredentialField::new("IBAPI password", 4, api_password));
        }
        fields
    }

    fn login_captions(&self) -> &'static [&'static str] {
        &["Log In", "Paper Log In"]
    }
}
