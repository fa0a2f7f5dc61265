use tracing::info;

use crate::config::AppMode;
use crate::errors::AutomationError;
use crate::handlers::frames::open_trades_log;
use crate::handoff::NamedWindow;
use crate::ui::KeyChord;

use super::{InfoSink, TaskContext};

async fn send_to_main_window(
    ctx: &TaskContext,
    info: &InfoSink,
    name: &'static str,
    chord: KeyChord,
) -> Result<(), AutomationError> {
    info.send("waiting for main window");
    let main = ctx.wait_for(NamedWindow::MainWindow).await?;
    ctx.executor
        .call(name, move |lane| {
            lane.ui().send_keystroke(main, chord);
            info!(%chord, "keystroke sent to main window");
        })
        .await
}

/// RECONNECTACCOUNT: Ctrl+Alt+R on the main window.
pub async fn reconnect_account(ctx: &TaskContext, info: &InfoSink) -> Result<(), AutomationError> {
    send_to_main_window(ctx, info, "reconnect-account", KeyChord::ctrl_alt('r')).await
}

/// RECONNECTDATA: Ctrl+Alt+F on the main window.
pub async fn reconnect_data(ctx: &TaskContext, info: &InfoSink) -> Result<(), AutomationError> {
    send_to_main_window(ctx, info, "reconnect-data", KeyChord::ctrl_alt('f')).await
}

/// STOP: the orderly shutdown menu item of the main window.
pub async fn stop(ctx: &TaskContext, info: &InfoSink) -> Result<(), AutomationError> {
    info.send("waiting for main window");
    let main = ctx.wait_for(NamedWindow::MainWindow).await?;
    let path: &'static [&'static str] = match ctx.mode {
        AppMode::Tws => &["File", "Exit"],
        AppMode::Gateway => &["File", "Close"],
    };
    ctx.executor
        .call("stop", move |lane| -> Result<(), AutomationError> {
            let ui = lane.ui();
            let item = ui
                .find_menu_item(main, path)
                .ok_or_else(|| AutomationError::not_found(format!("{} menu item", path.join(" > "))))?;
            ui.click(item);
            info!("shutdown requested");
            Ok(())
        })
        .await?
}

/// Opens the trades log once the main window exists.
pub async fn show_trades_log(ctx: &TaskContext, info: &InfoSink) -> Result<(), AutomationError> {
    info.send("waiting for main window");
    let main = ctx.wait_for(NamedWindow::MainWindow).await?;
    ctx.executor
        .call("show-trades-log", move |lane| -> Result<(), AutomationError> {
            open_trades_log(lane.ui(), main)?;
            info!("trades log requested");
            Ok(())
        })
        .await?
}
