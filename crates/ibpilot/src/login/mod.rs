//! Login automation as an explicit state machine.
//!
//! Each call to [`LoginMachine::step`] performs one bounded transition. While
//! waiting for the login button to take effect the machine re-queues itself on
//! the UI lane with a delay instead of sleeping, so other queued work keeps
//! flowing between polls.

pub mod forms;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::AutomationConfig;
use crate::dispatcher::WindowEventKind;
use crate::errors::AutomationError;
use crate::executor::Lane;
use crate::handlers::WindowHandler;
use crate::handoff::NamedWindow;
use crate::ui::{describe, Scope, UiFacade, WindowRef};

use forms::LoginForm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Init,
    AwaitCredentials,
    FieldsPopulated,
    LoggingIn { attempts: u32, clicks: u32 },
    Done,
    /// Stopped for manual input; the window is left to the user.
    Halted,
}

impl LoginState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoginState::Done | LoginState::Halted)
    }
}

/// What the driver should do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    PollAgain(Duration),
    Finished,
}

pub struct LoginMachine {
    form: Arc<dyn LoginForm>,
    config: Arc<AutomationConfig>,
    window: WindowRef,
    state: LoginState,
}

impl LoginMachine {
    pub fn new(form: Arc<dyn LoginForm>, config: Arc<AutomationConfig>, window: WindowRef) -> Self {
        Self {
            form,
            config,
            window,
            state: LoginState::Init,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    pub fn step(&mut self, ui: &dyn UiFacade) -> Result<Step, AutomationError> {
        let window = self.window;
        match self.state {
            LoginState::Init => {
                self.form.initialise(ui, window, &self.config)?;
                self.state = LoginState::AwaitCredentials;
                Ok(Step::Continue)
            }
            LoginState::AwaitCredentials => {
                let fields = self.form.credential_fields(&self.config);
                if let Some(missing) = fields.iter().find(|field| field.value.is_empty()) {
                    match ui.find_text_field(Scope::Window(window), missing.index) {
                        Some(field) => ui.focus(field),
                        None => warn!(field = missing.label, "cannot focus missing credential field"),
                    }
                    warn!(field = missing.label, "credential not configured; waiting for manual login");
                    self.state = LoginState::Halted;
                    return Ok(Step::Finished);
                }
                self.state = LoginState::FieldsPopulated;
                Ok(Step::Continue)
            }
            LoginState::FieldsPopulated => {
                for credential in self.form.credential_fields(&self.config) {
                    let field = ui
                        .find_text_field(Scope::Window(window), credential.index)
                        .ok_or_else(|| AutomationError::not_found(format!("{} field", credential.label)))?;
                    ui.set_text(field, &credential.value);
                }
                self.state = LoginState::LoggingIn {
                    attempts: 0,
                    clicks: 0,
                };
                Ok(Step::Continue)
            }
            LoginState::LoggingIn { attempts, clicks } => self.poll_login(ui, attempts, clicks),
            LoginState::Done | LoginState::Halted => Ok(Step::Finished),
        }
    }

    fn poll_login(
        &mut self,
        ui: &dyn UiFacade,
        attempts: u32,
        mut clicks: u32,
    ) -> Result<Step, AutomationError> {
        let window = self.window;
        if !ui.is_visible(window) {
            info!(clicks, "login window closed; login submitted");
            self.state = LoginState::Done;
            return Ok(Step::Finished);
        }

        let button = self.form.login_button(ui, window).ok_or_else(|| {
            AutomationError::not_found(format!("login button {:?}", self.form.login_captions()))
        })?;
        let enabled = ui.is_enabled(button);
        if clicks > 0 && !enabled {
            info!(clicks, "login button disabled; login submitted");
            self.state = LoginState::Done;
            return Ok(Step::Finished);
        }

        let limit = self.config.login.poll_attempts;
        if attempts >= limit {
            return Err(AutomationError::InvalidState(format!(
                "login not accepted after {limit} attempts"
            )));
        }
        if enabled {
            ui.click(button);
            clicks += 1;
            info!(attempt = attempts + 1, "login button clicked");
        }
        self.state = LoginState::LoggingIn {
            attempts: attempts + 1,
            clicks,
        };
        Ok(Step::PollAgain(self.config.login.poll_interval))
    }

    /// Steps until the machine finishes or needs to wait, re-queueing itself
    /// on the lane for the next poll.
    pub fn drive(mut self, lane: &Lane<'_>) -> Result<(), AutomationError> {
        loop {
            match self.step(lane.ui())? {
                Step::Continue => continue,
                Step::Finished => return Ok(()),
                Step::PollAgain(delay) => {
                    lane.executor().submit_after(delay, "login-poll", move |lane| {
                        let window = self.window;
                        if let Err(err) = self.drive(lane) {
                            error!(title = %describe(lane.ui(), window), error = %err, "login failed");
                        }
                    });
                    return Ok(());
                }
            }
        }
    }
}

/// Starts a fresh [`LoginMachine`] every time a login window opens.
pub struct LoginFrameHandler {
    name: &'static str,
    form: Arc<dyn LoginForm>,
    config: Arc<AutomationConfig>,
}

impl LoginFrameHandler {
    pub fn new(name: &'static str, form: Arc<dyn LoginForm>, config: Arc<AutomationConfig>) -> Self {
        Self { name, form, config }
    }
}

impl WindowHandler for LoginFrameHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    fn filter_event(&self, kind: WindowEventKind) -> bool {
        kind == WindowEventKind::Opened
    }

    fn recognize_window(&self, ui: &dyn UiFacade, window: WindowRef) -> bool {
        self.form.recognize(ui, window)
    }

    fn handle_window(
        &self,
        lane: &Lane<'_>,
        window: WindowRef,
        _kind: WindowEventKind,
    ) -> Result<(), AutomationError> {
        info!(handler = self.name, title = %describe(lane.ui(), window), "starting login");
        LoginMachine::new(self.form.clone(), self.config.clone(), window).drive(lane)
    }

    fn provides(&self) -> Option<NamedWindow> {
        Some(NamedWindow::LoginFrame)
    }
}
