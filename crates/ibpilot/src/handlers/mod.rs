//! Window classifiers and the canned interaction each one performs.

mod connection;
pub(crate) mod frames;
pub(crate) mod notices;
mod session;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::config::AutomationConfig;
use crate::dispatcher::WindowEventKind;
use crate::errors::{AutomationError, ExitHook};
use crate::executor::Lane;
use crate::handoff::{NamedWindow, NamedWindows};
use crate::login::{forms, LoginFrameHandler};
use crate::ui::{UiFacade, WindowRef};

pub use connection::{
    AcceptIncomingConnectionHandler, ApiChangeConfirmationHandler, SecondFactorAuthenticationHandler,
    SecurityCodeHandler,
};
pub use frames::{
    GatewayMainWindowHandler, GlobalConfigurationHandler, MainWindowHandler, SplashFrameHandler,
    TradesFrameHandler,
};
pub use notices::{DemoOrderPrecautionsHandler, Dismiss, NoticeHandler};
pub use session::{ExistingSessionDetectedHandler, ExitSessionHandler, NotCurrentlyAvailableHandler};

/// A classifier plus action bound to one recognisable window shape.
///
/// Handlers run on the UI lane only. Any state they keep across events must
/// use interior mutability because the registry is shared immutably.
pub trait WindowHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap pre-check on the event kind, before any widget lookup.
    fn filter_event(&self, kind: WindowEventKind) -> bool;

    fn recognize_window(&self, ui: &dyn UiFacade, window: WindowRef) -> bool;

    fn handle_window(
        &self,
        lane: &Lane<'_>,
        window: WindowRef,
        kind: WindowEventKind,
    ) -> Result<(), AutomationError>;

    /// Named window fulfilled when this handler claims an event.
    fn provides(&self) -> Option<NamedWindow> {
        None
    }
}

/// Ordered, immutable handler chain. Earlier entries win.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: Arc<[Box<dyn WindowHandler>]>,
}

impl HandlerRegistry {
    pub fn new(handlers: Vec<Box<dyn WindowHandler>>) -> Self {
        Self {
            handlers: handlers.into(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn WindowHandler> {
        self.handlers.iter().map(|handler| handler.as_ref())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|handler| handler.name()).collect()
    }
}

/// Everything handlers may need besides the lane itself.
#[derive(Clone)]
pub struct HandlerContext {
    pub config: Arc<AutomationConfig>,
    pub windows: Arc<NamedWindows>,
    pub exit: ExitHook,
    /// Armed when the API port is changed while API access is already enabled.
    pub api_change_expected: Arc<AtomicBool>,
}

/// The standard chain, in the order the workstation's windows must be tested.
pub fn default_registry(ctx: &HandlerContext) -> HandlerRegistry {
    let config = &ctx.config;
    HandlerRegistry::new(vec![
        Box::new(AcceptIncomingConnectionHandler::new(config.accept_incoming_connection)),
        Box::new(notices::blind_trading_warning()),
        Box::new(ExitSessionHandler::new(config.auto_closedown)),
        Box::new(LoginFrameHandler::new(
            "LoginFrame",
            Arc::new(forms::TwsLoginForm),
            config.clone(),
        )),
        Box::new(LoginFrameHandler::new(
            "GatewayLoginFrame",
            Arc::new(forms::GatewayLoginForm),
            config.clone(),
        )),
        Box::new(MainWindowHandler),
        Box::new(GatewayMainWindowHandler),
        Box::new(notices::newer_version()),
        Box::new(notices::newer_version_frame()),
        Box::new(NotCurrentlyAvailableHandler::new(ctx.windows.clone())),
        Box::new(notices::tip_of_the_day()),
        Box::new(notices::nse_compliance(config.dismiss_nse_compliance_notice)),
        Box::new(notices::password_expiry_warning(config.dismiss_password_expiry_warning)),
        Box::new(GlobalConfigurationHandler),
        Box::new(TradesFrameHandler::new(config.show_all_trades, ctx.windows.clone())),
        Box::new(ExistingSessionDetectedHandler::new(config.existing_session)),
        Box::new(ApiChangeConfirmationHandler::new(ctx.api_change_expected.clone())),
        Box::new(SplashFrameHandler),
        Box::new(SecurityCodeHandler::new(config.login.read_only_login)),
        Box::new(notices::relogin()),
        Box::new(SecondFactorAuthenticationHandler::new(ctx.exit.clone())),
        Box::new(DemoOrderPrecautionsHandler::new(config.demo_api_enable)),
    ])
}
