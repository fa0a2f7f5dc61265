mod fake_ui;
mod handler_tests;

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::errors::{ExitCode, ExitHook};
use crate::tasks::api::ENABLE_API_CHECKBOX;
use crate::ui::{WindowKind, WindowRef};

use fake_ui::FakeUi;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Exit hook that records codes instead of terminating the test process.
fn recording_exit_hook() -> (ExitHook, Arc<Mutex<Vec<ExitCode>>>) {
    let codes = Arc::new(Mutex::new(Vec::new()));
    let recorded = codes.clone();
    let hook: ExitHook = Arc::new(move |code| recorded.lock().push(code));
    (hook, codes)
}

/// Polls `condition` until it holds or two seconds pass.
fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn tws_main_window(ui: &FakeUi) -> WindowRef {
    let main = ui.add_window(WindowKind::Frame, "Interactive Brokers Trader Workstation");
    ui.add_menu_item(main, &["Help", "About Trader Workstation..."]);
    ui.add_menu_item(main, &["Edit", "Global Configuration..."]);
    ui.add_menu_item(main, &["File", "Exit"]);
    main
}

/// A configuration dialog on its API page, with the socket clients checkbox.
fn config_dialog(ui: &FakeUi, api_enabled: bool) -> WindowRef {
    let dialog = ui.add_window(WindowKind::Dialog, "Trader Workstation Configuration");
    ui.add_section(dialog, &["API", "Settings"]);
    ui.add_check_box(dialog, ENABLE_API_CHECKBOX, api_enabled);
    ui.add_button(dialog, "OK");
    dialog
}
