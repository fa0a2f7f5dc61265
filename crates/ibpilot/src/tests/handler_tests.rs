//! The standard handler chain against one window shape at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::fake_ui::FakeUi;
use super::{config_dialog, init_tracing, recording_exit_hook, tws_main_window};
use crate::config::{AppMode, AutomationConfig, ExistingSessionPolicy, IncomingConnectionPolicy};
use crate::dispatcher::{WindowEvent, WindowEventDispatcher, WindowEventKind};
use crate::errors::ExitCode;
use crate::executor::{LaneHandle, UiExecutor};
use crate::handlers::{default_registry, HandlerContext};
use crate::handoff::{NamedWindow, NamedWindows};
use crate::ui::{UiFacade, WindowKind, WindowRef};

const DONT_DISPLAY_AGAIN: &str = "Don't display this message again.";

/// A live lane running the default registry built from `config`.
struct Workstation {
    ui: FakeUi,
    lane: LaneHandle,
    dispatcher: WindowEventDispatcher,
    windows: Arc<NamedWindows>,
    api_change_expected: Arc<AtomicBool>,
    exits: Arc<Mutex<Vec<ExitCode>>>,
}

impl Workstation {
    fn new(config: AutomationConfig) -> Self {
        init_tracing();
        let ui = FakeUi::new();
        let (exit, exits) = recording_exit_hook();
        let windows = NamedWindows::new();
        let api_change_expected = Arc::new(AtomicBool::new(false));
        let registry = default_registry(&HandlerContext {
            config: Arc::new(config),
            windows: windows.clone(),
            exit: exit.clone(),
            api_change_expected: api_change_expected.clone(),
        });
        let lane = UiExecutor::spawn(ui.boxed()).unwrap();
        let dispatcher = WindowEventDispatcher::new(registry, lane.executor(), windows.clone(), exit);
        Self {
            ui,
            lane,
            dispatcher,
            windows,
            api_change_expected,
            exits,
        }
    }

    fn tws() -> Self {
        Self::new(AutomationConfig::new(AppMode::Tws))
    }

    fn dispatch(&self, window: WindowRef, kind: WindowEventKind) -> Option<&'static str> {
        let dispatcher = self.dispatcher.clone();
        self.lane
            .executor()
            .call_blocking("test-dispatch", move |lane| {
                dispatcher.dispatch(lane, WindowEvent { window, kind })
            })
            .unwrap()
    }

    fn open(&self, window: WindowRef) -> Option<&'static str> {
        self.dispatch(window, WindowEventKind::Opened)
    }

    /// Every handler that would claim `window` for an Opened event.
    fn recognizers(&self, window: WindowRef) -> Vec<&'static str> {
        self.dispatcher
            .registry()
            .iter()
            .filter(|handler| handler.filter_event(WindowEventKind::Opened))
            .filter(|handler| handler.recognize_window(&self.ui, window))
            .map(|handler| handler.name())
            .collect()
    }
}

fn incoming_connection_dialog(ui: &FakeUi) -> WindowRef {
    let dialog = ui.add_window(WindowKind::Dialog, "");
    ui.add_label(dialog, "Accept incoming connection attempt from 10.0.0.5?");
    ui.add_button(dialog, "OK");
    ui.add_button(dialog, "No");
    dialog
}

fn login_frame(ui: &FakeUi) -> WindowRef {
    let frame = ui.add_window(WindowKind::Frame, "Login");
    ui.add_toggle(frame, "Live Trading");
    ui.add_toggle(frame, "Paper Trading");
    ui.add_text_field(frame, None);
    ui.add_text_field(frame, None);
    ui.add_button(frame, "Login");
    frame
}

fn not_available_dialog(ui: &FakeUi) -> WindowRef {
    let notice = ui.add_window(WindowKind::Dialog, "Login");
    ui.add_label(notice, "Login is not currently available");
    ui.add_button(notice, "OK");
    notice
}

fn exit_session_frame(ui: &FakeUi) -> WindowRef {
    let frame = ui.add_window(WindowKind::Frame, "Exit Session Setting");
    ui.add_text_field(frame, None);
    ui.add_toggle(frame, "AM");
    ui.add_toggle(frame, "PM");
    ui.add_button(frame, "Update");
    frame
}

fn trades_frame(ui: &FakeUi) -> WindowRef {
    let frame = ui.add_window(WindowKind::Frame, "Trades");
    ui.add_check_box(frame, "All", false);
    frame
}

#[test]
fn test_incoming_connection_policies() {
    let cases = [
        (IncomingConnectionPolicy::Accept, vec!["OK".to_string()]),
        (IncomingConnectionPolicy::Reject, vec!["No".to_string()]),
        (IncomingConnectionPolicy::Manual, Vec::new()),
    ];
    for (policy, expected) in cases {
        let mut config = AutomationConfig::new(AppMode::Tws);
        config.accept_incoming_connection = policy;
        let station = Workstation::new(config);
        let dialog = incoming_connection_dialog(&station.ui);

        assert_eq!(station.open(dialog), Some("AcceptIncomingConnection"), "{policy:?}");
        assert_eq!(station.ui.clicks(), expected, "{policy:?}");
    }
}

#[test]
fn test_existing_session_policies() {
    let cases = [
        (ExistingSessionPolicy::Primary, vec!["Continue Login".to_string()]),
        (ExistingSessionPolicy::Secondary, vec!["Cancel".to_string()]),
        (ExistingSessionPolicy::Manual, Vec::new()),
    ];
    for (policy, expected) in cases {
        let mut config = AutomationConfig::new(AppMode::Tws);
        config.existing_session = policy;
        let station = Workstation::new(config);
        let dialog = station.ui.add_window(WindowKind::Dialog, "Existing session detected");
        station.ui.add_button(dialog, "Continue Login");
        station.ui.add_button(dialog, "Cancel");

        assert_eq!(station.open(dialog), Some("ExistingSessionDetected"), "{policy:?}");
        assert_eq!(station.ui.clicks(), expected, "{policy:?}");
    }
}

#[test]
fn test_exit_session_moves_logoff_time_when_auto_closedown_is_off() {
    let mut config = AutomationConfig::new(AppMode::Tws);
    config.auto_closedown = false;
    let station = Workstation::new(config);
    let frame = exit_session_frame(&station.ui);

    assert_eq!(station.open(frame), Some("ExitSession"));

    let field = station
        .ui
        .find_text_field(crate::ui::Scope::Window(frame), 0)
        .unwrap();
    let text = station.ui.text(field);
    assert_eq!(text.len(), 5, "hh:mm expected, got {text:?}");
    assert_eq!(&text[2..3], ":");
    let am = station.ui.find_toggle_button(frame, "AM").unwrap();
    let pm = station.ui.find_toggle_button(frame, "PM").unwrap();
    assert!(station.ui.selected(am) != station.ui.selected(pm));
    assert_eq!(station.ui.click_count("Update"), 1);
}

#[test]
fn test_exit_session_left_alone_with_auto_closedown() {
    let station = Workstation::tws();
    let frame = exit_session_frame(&station.ui);
    assert_eq!(station.open(frame), Some("ExitSession"));
    assert!(station.ui.clicks().is_empty());
}

#[test]
fn test_exit_session_window_recognised_after_title_changes() {
    let station = Workstation::tws();
    let frame = exit_session_frame(&station.ui);
    assert_eq!(station.open(frame), Some("ExitSession"));

    station.ui.set_title(frame, "");
    assert_eq!(
        station.dispatch(frame, WindowEventKind::Activated),
        Some("ExitSession")
    );

    let stranger = station.ui.add_window(WindowKind::Frame, "");
    assert_eq!(station.dispatch(stranger, WindowEventKind::Activated), None);
}

#[test]
fn test_security_code_read_only_login() {
    for read_only in [true, false] {
        let mut config = AutomationConfig::new(AppMode::Tws);
        config.login.read_only_login = read_only;
        let station = Workstation::new(config);
        let dialog = station.ui.add_window(WindowKind::Dialog, "Security Code Card Authentication");
        station.ui.add_label(dialog, "Enter security code for index 12");
        station.ui.add_button(dialog, "Enter Read Only");

        assert_eq!(station.open(dialog), Some("SecurityCode"));
        assert_eq!(station.ui.click_count("Enter Read Only"), usize::from(read_only));
    }
}

#[test]
fn test_api_change_confirmation_only_when_armed() {
    let station = Workstation::tws();
    let dialog = station
        .ui
        .add_window(WindowKind::Dialog, "Configuration Change Confirmation");
    station.ui.add_button(dialog, "Yes");

    assert_eq!(station.open(dialog), None);
    assert!(station.ui.clicks().is_empty());

    station.api_change_expected.store(true, Ordering::SeqCst);
    assert_eq!(station.open(dialog), Some("ApiChangeConfirmation"));
    assert_eq!(station.ui.clicks(), vec!["Yes".to_string()]);
    assert!(!station.api_change_expected.load(Ordering::SeqCst));

    // Disarmed again after confirming.
    assert_eq!(station.open(dialog), None);
}

#[test]
fn test_demo_order_precautions() {
    let disabled = Workstation::tws();
    let dialog = disabled.ui.add_window(WindowKind::Dialog, "IB TWS (Demo System)");
    disabled.ui.add_check_box(dialog, DONT_DISPLAY_AGAIN, false);
    disabled.ui.add_button(dialog, "OK");
    assert_eq!(disabled.open(dialog), None);

    let mut config = AutomationConfig::new(AppMode::Tws);
    config.demo_api_enable = true;
    let enabled = Workstation::new(config);
    let dialog = enabled.ui.add_window(WindowKind::Dialog, "IB TWS (Demo System)");
    let check_box = enabled.ui.add_check_box(dialog, DONT_DISPLAY_AGAIN, false);
    enabled.ui.add_button(dialog, "OK");

    assert_eq!(enabled.open(dialog), Some("DemoOrderPrecautions"));
    assert!(enabled.ui.selected(check_box));
    assert_eq!(enabled.ui.clicks(), vec!["OK".to_string()]);
}

#[test]
fn test_notices_are_dismissed() {
    let station = Workstation::tws();
    let cases: [(&str, WindowKind, &str, Option<&str>, &str); 5] = [
        ("BlindTradingWarning", WindowKind::Dialog, "Warning", Some("Blind Trading is enabled"), "Yes"),
        ("NewerVersionDialog", WindowKind::Dialog, "", Some("A newer version is available"), "No"),
        ("NewerVersionFrame", WindowKind::Frame, "", Some("A newer version is available"), "No"),
        ("TipOfTheDay", WindowKind::Dialog, "Tip of the Day", None, "Close"),
        ("ReloginDialog", WindowKind::Dialog, "Re-login is required", None, "Re-login"),
    ];
    for (name, kind, title, label, button) in cases {
        let window = station.ui.add_window(kind, title);
        if let Some(label) = label {
            station.ui.add_label(window, label);
        }
        station.ui.add_button(window, button);
        let before = station.ui.click_count(button);

        assert_eq!(station.open(window), Some(name));
        assert_eq!(station.ui.click_count(button), before + 1, "{name}");
    }
}

#[test]
fn test_optional_notices_follow_their_settings() {
    // Defaults: NSE notice dismissed, password expiry left for the user.
    let defaults = Workstation::tws();
    let nse = defaults.ui.add_window(WindowKind::Frame, "NSE Compliance");
    let expiry = defaults
        .ui
        .add_window(WindowKind::Frame, "Password Expiry Notification");
    defaults.ui.add_button(expiry, "OK");

    assert_eq!(defaults.open(nse), Some("NSECompliance"));
    assert!(!defaults.ui.window_visible(nse));
    assert_eq!(defaults.open(expiry), Some("PasswordExpiryWarning"));
    assert!(defaults.ui.clicks().is_empty());

    let mut config = AutomationConfig::new(AppMode::Tws);
    config.dismiss_nse_compliance_notice = false;
    config.dismiss_password_expiry_warning = true;
    let flipped = Workstation::new(config);
    let nse = flipped.ui.add_window(WindowKind::Frame, "NSE Compliance");
    let expiry = flipped
        .ui
        .add_window(WindowKind::Frame, "Password Expiry Notification");
    flipped.ui.add_button(expiry, "OK");

    assert_eq!(flipped.open(nse), Some("NSECompliance"));
    assert!(flipped.ui.window_visible(nse));
    assert_eq!(flipped.open(expiry), Some("PasswordExpiryWarning"));
    assert_eq!(flipped.ui.clicks(), vec!["OK".to_string()]);
}

#[test]
fn test_trades_log_kept_showing_all_trades() {
    let mut config = AutomationConfig::new(AppMode::Tws);
    config.show_all_trades = true;
    let station = Workstation::new(config);
    let main = tws_main_window(&station.ui);
    station.ui.add_menu_item(main, &["Account", "Trade Log"]);
    assert_eq!(station.open(main), Some("MainWindow"));

    let trades = trades_frame(&station.ui);
    let all = station.ui.find_check_box(trades, "All").unwrap();
    assert_eq!(station.open(trades), Some("TradesFrame"));
    assert!(station.ui.selected(all));

    assert_eq!(
        station.dispatch(trades, WindowEventKind::Closed),
        Some("TradesFrame")
    );
    assert_eq!(station.ui.clicks(), vec!["Account > Trade Log".to_string()]);
}

#[test]
fn test_trades_log_untouched_without_show_all_trades() {
    let station = Workstation::tws();
    let trades = trades_frame(&station.ui);
    let all = station.ui.find_check_box(trades, "All").unwrap();

    assert_eq!(station.open(trades), Some("TradesFrame"));
    assert_eq!(
        station.dispatch(trades, WindowEventKind::Closed),
        Some("TradesFrame")
    );
    assert!(!station.ui.selected(all));
    assert!(station.ui.clicks().is_empty());
}

#[test]
fn test_splash_frame_is_claimed_quietly() {
    let station = Workstation::tws();
    let splash = station.ui.add_window(WindowKind::Frame, "Starting application...");
    assert_eq!(station.open(splash), Some("SplashFrame"));
    assert_eq!(
        station.dispatch(splash, WindowEventKind::Closed),
        Some("SplashFrame")
    );
    assert!(station.ui.clicks().is_empty());
}

#[test]
fn test_not_currently_available_closes_latest_login_frame() {
    let station = Workstation::tws();

    let first = login_frame(&station.ui);
    assert_eq!(station.open(first), Some("LoginFrame"));
    station.ui.set_visible(first, false);

    let second = login_frame(&station.ui);
    assert_eq!(station.open(second), Some("LoginFrame"));
    assert_eq!(station.windows.get(NamedWindow::LoginFrame), Some(second));

    let notice = not_available_dialog(&station.ui);
    assert_eq!(station.open(notice), Some("NotCurrentlyAvailable"));

    let keystrokes = station.ui.keystrokes();
    assert_eq!(keystrokes.len(), 1);
    assert_eq!(keystrokes[0].0, second);
    assert_eq!(keystrokes[0].1.to_string(), "Alt+F4");
}

#[test]
fn test_each_window_shape_has_exactly_one_handler() {
    let mut config = AutomationConfig::new(AppMode::Tws);
    config.demo_api_enable = true;
    let station = Workstation::new(config);
    station.api_change_expected.store(true, Ordering::SeqCst);
    let ui = &station.ui;

    let blind = ui.add_window(WindowKind::Dialog, "Warning");
    ui.add_label(blind, "Blind Trading is enabled");
    let newer_dialog = ui.add_window(WindowKind::Dialog, "");
    ui.add_label(newer_dialog, "A newer version is available");
    let newer_frame = ui.add_window(WindowKind::Frame, "");
    ui.add_label(newer_frame, "A newer version is available");
    let gateway_login = ui.add_window(WindowKind::Frame, "IB Gateway");
    ui.add_button(gateway_login, "Log In");
    let gateway_main = ui.add_window(WindowKind::Frame, "IB Gateway");
    ui.add_menu_item(gateway_main, &["Configure", "Settings"]);
    let security = ui.add_window(WindowKind::Dialog, "Security Code Card Authentication");
    ui.add_label(security, "Enter security code for index 12");
    let demo = ui.add_window(WindowKind::Dialog, "IB TWS (Demo System)");
    ui.add_check_box(demo, DONT_DISPLAY_AGAIN, false);

    let shapes = [
        (incoming_connection_dialog(ui), "AcceptIncomingConnection"),
        (blind, "BlindTradingWarning"),
        (exit_session_frame(ui), "ExitSession"),
        (login_frame(ui), "LoginFrame"),
        (gateway_login, "GatewayLoginFrame"),
        (tws_main_window(ui), "MainWindow"),
        (gateway_main, "GatewayMainWindow"),
        (newer_dialog, "NewerVersionDialog"),
        (newer_frame, "NewerVersionFrame"),
        (not_available_dialog(ui), "NotCurrentlyAvailable"),
        (ui.add_window(WindowKind::Dialog, "Tip of the Day"), "TipOfTheDay"),
        (ui.add_window(WindowKind::Frame, "NSE Compliance"), "NSECompliance"),
        (
            ui.add_window(WindowKind::Frame, "Password Expiry Notification"),
            "PasswordExpiryWarning",
        ),
        (config_dialog(ui, false), "GlobalConfiguration"),
        (trades_frame(ui), "TradesFrame"),
        (
            ui.add_window(WindowKind::Dialog, "Existing session detected"),
            "ExistingSessionDetected",
        ),
        (
            ui.add_window(WindowKind::Dialog, "Configuration Change Confirmation"),
            "ApiChangeConfirmation",
        ),
        (ui.add_window(WindowKind::Frame, "Starting application..."), "SplashFrame"),
        (security, "SecurityCode"),
        (ui.add_window(WindowKind::Dialog, "Re-login is required"), "ReloginDialog"),
        (
            ui.add_window(WindowKind::Dialog, "Second Factor Authentication"),
            "SecondFactorAuthentication",
        ),
        (demo, "DemoOrderPrecautions"),
    ];

    let mut names: Vec<&str> = shapes.iter().map(|(_, name)| *name).collect();
    names.sort_unstable();
    let mut registered = station.dispatcher.registry().names();
    registered.sort_unstable();
    assert_eq!(names, registered, "every registered handler has a shape");

    for (window, name) in shapes {
        assert_eq!(station.recognizers(window), vec![name]);
    }
    assert!(station.exits.lock().is_empty());
}
