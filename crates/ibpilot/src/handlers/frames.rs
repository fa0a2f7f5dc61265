use std::sync::Arc;

use tracing::{debug, info};

use crate::dispatcher::WindowEventKind;
use crate::errors::AutomationError;
use crate::executor::Lane;
use crate::handoff::{NamedWindow, NamedWindows};
use crate::ui::{describe, ensure_check_box, UiFacade, WindowKind, WindowRef};

use super::WindowHandler;

pub(crate) const GATEWAY_TITLES: [&str; 2] = ["IB Gateway", "Interactive Brokers Gateway"];

pub(crate) fn is_gateway_title(ui: &dyn UiFacade, window: WindowRef) -> bool {
    GATEWAY_TITLES.iter().any(|title| ui.title_contains(window, title))
}

/// The TWS main frame, identified by its Help menu.
pub struct MainWindowHandler;

impl WindowHandler for MainWindowHandler {
    fn name(&self) -> &'static str {
        "MainWindow"
    }

    fn filter_event(&self, kind: WindowEventKind) -> bool {
        kind == WindowEventKind::Opened
    }

    fn recognize_window(&self, ui: &dyn UiFacade, window: WindowRef) -> bool {
        ui.window_kind(window) == WindowKind::Frame
            && ui
                .find_menu_item(window, &["Help", "About Trader Workstation..."])
                .is_some()
    }

    fn handle_window(
        &self,
        lane: &Lane<'_>,
        window: WindowRef,
        _kind: WindowEventKind,
    ) -> Result<(), AutomationError> {
        info!(title = %describe(lane.ui(), window), "main window ready");
        Ok(())
    }

    fn provides(&self) -> Option<NamedWindow> {
        Some(NamedWindow::MainWindow)
    }
}

pub struct GatewayMainWindowHandler;

impl WindowHandler for GatewayMainWindowHandler {
    fn name(&self) -> &'static str {
        "GatewayMainWindow"
    }

    fn filter_event(&self, kind: WindowEventKind) -> bool {
        kind == WindowEventKind::Opened
    }

    fn recognize_window(&self, ui: &dyn UiFacade, window: WindowRef) -> bool {
        ui.window_kind(window) == WindowKind::Frame
            && is_gateway_title(ui, window)
            && ui.find_menu_item(window, &["Configure", "Settings"]).is_some()
    }

    fn handle_window(
        &self,
        lane: &Lane<'_>,
        window: WindowRef,
        _kind: WindowEventKind,
    ) -> Result<(), AutomationError> {
        info!(title = %describe(lane.ui(), window), "gateway main window ready");
        Ok(())
    }

    fn provides(&self) -> Option<NamedWindow> {
        Some(NamedWindow::MainWindow)
    }
}

/// The settings dialog, reused for the life of the process once created.
pub struct GlobalConfigurationHandler;

impl WindowHandler for GlobalConfigurationHandler {
    fn name(&self) -> &'static str {
        "GlobalConfiguration"
    }

    fn filter_event(&self, kind: WindowEventKind) -> bool {
        kind == WindowEventKind::Opened
    }

    fn recognize_window(&self, ui: &dyn UiFacade, window: WindowRef) -> bool {
        if ui.window_kind(window) != WindowKind::Dialog {
            return false;
        }
        ui.title(window)
            .map(|title| title.contains("Global Configuration") || title.ends_with("Configuration"))
            .unwrap_or(false)
    }

    fn handle_window(
        &self,
        _lane: &Lane<'_>,
        window: WindowRef,
        _kind: WindowEventKind,
    ) -> Result<(), AutomationError> {
        info!(%window, "configuration dialog available");
        Ok(())
    }

    fn provides(&self) -> Option<NamedWindow> {
        Some(NamedWindow::ConfigDialog)
    }
}

pub(crate) const TRADES_LOG_MENU: [&str; 2] = ["Account", "Trade Log"];

/// Opens the trades log from the main window's menu. Must run on the lane.
pub(crate) fn open_trades_log(ui: &dyn UiFacade, main: WindowRef) -> Result<(), AutomationError> {
    let item = ui
        .find_menu_item(main, &TRADES_LOG_MENU)
        .ok_or_else(|| AutomationError::not_found(format!("{} menu item", TRADES_LOG_MENU.join(" > "))))?;
    ui.click(item);
    Ok(())
}

/// Keeps the trades log showing the whole week when `ShowAllTrades` is on:
/// the "All" checkbox is forced on and a closed log is opened again.
pub struct TradesFrameHandler {
    show_all: bool,
    windows: Arc<NamedWindows>,
}

impl TradesFrameHandler {
    pub fn new(show_all: bool, windows: Arc<NamedWindows>) -> Self {
        Self { show_all, windows }
    }
}

impl WindowHandler for TradesFrameHandler {
    fn name(&self) -> &'static str {
        "TradesFrame"
    }

    fn filter_event(&self, kind: WindowEventKind) -> bool {
        matches!(
            kind,
            WindowEventKind::Opened | WindowEventKind::Activated | WindowEventKind::Closed
        )
    }

    fn recognize_window(&self, ui: &dyn UiFacade, window: WindowRef) -> bool {
        ui.window_kind(window) == WindowKind::Frame && ui.title_contains(window, "Trades")
    }

    fn handle_window(
        &self,
        lane: &Lane<'_>,
        window: WindowRef,
        kind: WindowEventKind,
    ) -> Result<(), AutomationError> {
        if !self.show_all {
            return Ok(());
        }
        let ui = lane.ui();
        if kind == WindowEventKind::Closed {
            let Some(main) = self.windows.get(NamedWindow::MainWindow) else {
                debug!("trades log closed before the main window was seen");
                return Ok(());
            };
            open_trades_log(ui, main)?;
            info!("trades log closed; opened it again");
            return Ok(());
        }
        if ensure_check_box(ui, window, "All", true)? {
            info!("trades log now shows all trades");
        }
        Ok(())
    }
}

/// The startup splash. Claimed so nothing else reacts to it; its closing
/// marks the end of program startup.
pub struct SplashFrameHandler;

impl WindowHandler for SplashFrameHandler {
    fn name(&self) -> &'static str {
        "SplashFrame"
    }

    fn filter_event(&self, kind: WindowEventKind) -> bool {
        matches!(kind, WindowEventKind::Opened | WindowEventKind::Closed)
    }

    fn recognize_window(&self, ui: &dyn UiFacade, window: WindowRef) -> bool {
        ui.window_kind(window) == WindowKind::Frame && ui.title_contains(window, "Starting application")
    }

    fn handle_window(
        &self,
        _lane: &Lane<'_>,
        _window: WindowRef,
        kind: WindowEventKind,
    ) -> Result<(), AutomationError> {
        if kind == WindowEventKind::Closed {
            info!("splash screen closed; startup complete");
        } else {
            debug!("splash screen shown");
        }
        Ok(())
    }
}
