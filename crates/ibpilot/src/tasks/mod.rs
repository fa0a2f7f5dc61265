//! Scripted interactions run on behalf of commands and startup settings.
//!
//! Waiting for a window happens off the lane; only the widget work itself is
//! queued, so a slow dialog never holds up event dispatch.

pub mod api;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::AppMode;
use crate::errors::AutomationError;
use crate::executor::UiExecutor;
use crate::handoff::{NamedWindow, NamedWindows};
use crate::ui::{UiFacade, WindowRef};

pub use api::{ApplyApiSettings, EnableApi};
pub use session::{reconnect_account, reconnect_data, show_trades_log, stop};

/// Progress lines for the client that issued a command.
#[derive(Clone, Default)]
pub struct InfoSink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl InfoSink {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that drops everything, for startup tasks and suppressed INFO.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, text: impl Into<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(text.into());
        }
    }
}

/// What a task needs to reach the workstation's windows.
#[derive(Clone)]
pub struct TaskContext {
    pub executor: UiExecutor,
    pub windows: Arc<NamedWindows>,
    pub mode: AppMode,
    pub timeout: Duration,
}

impl TaskContext {
    pub async fn wait_for(&self, name: NamedWindow) -> Result<WindowRef, AutomationError> {
        self.windows.wait_async(name, self.timeout).await
    }
}

/// Work done against the configuration dialog once it is on screen.
pub trait ConfigurationAction: Send + 'static {
    type Output: Send + 'static;

    const NAME: &'static str;

    fn configure(self, ui: &dyn UiFacade, dialog: WindowRef) -> Result<Self::Output, AutomationError>;
}

const TWS_CONFIG_MENUS: [&[&str]; 2] = [
    &["Edit", "Global Configuration..."],
    &["Configure", "Global Configuration..."],
];
const GATEWAY_CONFIG_MENUS: [&[&str]; 1] = [&["Configure", "Settings"]];

/// Opens the configuration dialog from the main window's menu unless it is
/// already showing. Must run on the lane.
pub(crate) fn open_config_dialog(
    ui: &dyn UiFacade,
    main: WindowRef,
    mode: AppMode,
    cached: Option<WindowRef>,
) -> Result<(), AutomationError> {
    if let Some(dialog) = cached {
        if ui.is_visible(dialog) {
            debug!(%dialog, "configuration dialog already showing");
            return Ok(());
        }
    }
    let menus: &[&[&str]] = match mode {
        AppMode::Tws => &TWS_CONFIG_MENUS,
        AppMode::Gateway => &GATEWAY_CONFIG_MENUS,
    };
    let item = menus
        .iter()
        .find_map(|path| ui.find_menu_item(main, path))
        .ok_or_else(|| AutomationError::not_found("Global Configuration menu"))?;
    ui.click(item);
    info!("configuration dialog requested");
    Ok(())
}

/// Selects the API settings page, falling back to the bare API node.
pub(crate) fn select_api_section(ui: &dyn UiFacade, dialog: WindowRef) -> Result<(), AutomationError> {
    if ui.select_config_section(dialog, &["API", "Settings"]) || ui.select_config_section(dialog, &["API"]) {
        Ok(())
    } else {
        Err(AutomationError::not_found("API configuration section"))
    }
}

/// Obtains the configuration dialog and runs `action` against it on the lane.
pub async fn run_configuration_action<A: ConfigurationAction>(
    ctx: &TaskContext,
    info: &InfoSink,
    action: A,
) -> Result<A::Output, AutomationError> {
    info.send("waiting for main window");
    let main = ctx.wait_for(NamedWindow::MainWindow).await?;

    let cached = ctx.windows.get(NamedWindow::ConfigDialog);
    let mode = ctx.mode;
    ctx.executor
        .call("open-config-dialog", move |lane| {
            open_config_dialog(lane.ui(), main, mode, cached)
        })
        .await??;

    info.send("waiting for configuration dialog");
    let dialog = ctx.wait_for(NamedWindow::ConfigDialog).await?;
    ctx.executor
        .call(A::NAME, move |lane| action.configure(lane.ui(), dialog))
        .await?
}
