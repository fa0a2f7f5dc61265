//! Wires the components together in startup order.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{AppMode, AutomationConfig};
use crate::dispatcher::WindowEventDispatcher;
use crate::errors::{ExitCode, ExitHook};
use crate::executor::{LaneHandle, UiExecutor};
use crate::handlers::{default_registry, HandlerContext, HandlerRegistry};
use crate::handoff::NamedWindows;
use crate::jts_ini::{JtsIni, JtsIniError};
use crate::server::CommandServer;
use crate::settings::ConfigError;
use crate::shutdown::spawn_closedown;
use crate::tasks::{run_configuration_action, show_trades_log, ApplyApiSettings, InfoSink, TaskContext};
use crate::ui::UiFacade;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    JtsIni(#[from] JtsIniError),

    #[error("failed to start the UI lane: {0}")]
    Lane(#[source] io::Error),

    #[error("failed to start the command server on port {port}: {source}")]
    Server {
        port: u16,
        #[source]
        source: io::Error,
    },
}

impl StartupError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            StartupError::Config(ConfigError::Io { .. }) => ExitCode::SettingsIo,
            StartupError::Config(_) => ExitCode::Configuration,
            StartupError::JtsIni(e) => e.exit_code(),
            StartupError::Lane(_) | StartupError::Server { .. } => ExitCode::Configuration,
        }
    }
}

/// A running automation: the UI lane, the dispatcher and the async services.
pub struct Controller {
    config: Arc<AutomationConfig>,
    lane: LaneHandle,
    dispatcher: WindowEventDispatcher,
    windows: Arc<NamedWindows>,
    api_change_expected: Arc<AtomicBool>,
    shutdown: CancellationToken,
    services: Vec<JoinHandle<()>>,
}

impl Controller {
    /// Repairs jts.ini (when `IbDir` is set), then starts the UI lane with
    /// the standard handler chain. The host feeds window events to
    /// [`Controller::dispatcher`] from here on.
    pub fn start(
        config: AutomationConfig,
        ui: Box<dyn UiFacade>,
        exit: ExitHook,
    ) -> Result<Self, StartupError> {
        if let Some(dir) = &config.ib_dir {
            JtsIni::in_dir(dir).ensure_valid()?;
        }

        let config = Arc::new(config);
        let windows = NamedWindows::new();
        let api_change_expected = Arc::new(AtomicBool::new(false));
        let registry = default_registry(&HandlerContext {
            config: config.clone(),
            windows: windows.clone(),
            exit: exit.clone(),
            api_change_expected: api_change_expected.clone(),
        });
        Self::with_registry(config, ui, exit, registry, windows, api_change_expected)
    }

    /// Starts with a caller-supplied handler chain.
    pub fn with_registry(
        config: Arc<AutomationConfig>,
        ui: Box<dyn UiFacade>,
        exit: ExitHook,
        registry: HandlerRegistry,
        windows: Arc<NamedWindows>,
        api_change_expected: Arc<AtomicBool>,
    ) -> Result<Self, StartupError> {
        let lane = UiExecutor::spawn(ui).map_err(StartupError::Lane)?;
        info!(handlers = registry.len(), mode = ?config.mode, "UI lane started");
        let dispatcher = WindowEventDispatcher::new(registry, lane.executor(), windows.clone(), exit);
        Ok(Self {
            config,
            lane,
            dispatcher,
            windows,
            api_change_expected,
            shutdown: CancellationToken::new(),
            services: Vec::new(),
        })
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &WindowEventDispatcher {
        &self.dispatcher
    }

    pub fn windows(&self) -> &Arc<NamedWindows> {
        &self.windows
    }

    pub fn executor(&self) -> UiExecutor {
        self.lane.executor()
    }

    pub fn task_context(&self) -> TaskContext {
        TaskContext {
            executor: self.lane.executor(),
            windows: self.windows.clone(),
            mode: self.config.mode,
            timeout: self.config.server.command_timeout,
        }
    }

    /// Starts the command server, the closedown timer and the startup window
    /// tasks (trades log, API settings).
    /// Returns the server's bound address when it is enabled.
    pub async fn start_services(&mut self) -> Result<Option<SocketAddr>, StartupError> {
        let ctx = self.task_context();
        let mut server_addr = None;

        if self.config.server.port != 0 {
            let port = self.config.server.port;
            let server = CommandServer::bind(self.config.server.clone(), ctx.clone())
                .await
                .map_err(|source| StartupError::Server { port, source })?;
            server_addr = Some(server.local_addr().map_err(|source| StartupError::Server { port, source })?);
            self.services
                .push(tokio::spawn(server.run(self.shutdown.child_token())));
        } else {
            info!("command server disabled");
        }

        if let Some(at) = self.config.closedown_at {
            self.services
                .push(spawn_closedown(at, ctx.clone(), self.shutdown.child_token()));
        }

        if self.config.show_all_trades && self.config.mode == AppMode::Tws {
            let ctx = TaskContext {
                timeout: Duration::MAX,
                ..ctx.clone()
            };
            let cancel = self.shutdown.child_token();
            self.services.push(tokio::spawn(async move {
                let sink = InfoSink::disabled();
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    result = show_trades_log(&ctx, &sink) => if let Err(e) = result {
                        error!(error = %e, "failed to open the trades log");
                    },
                }
            }));
        }

        if !self.config.api.is_empty() {
            let action = ApplyApiSettings {
                settings: self.config.api.clone(),
                mode: self.config.mode,
                api_change_expected: self.api_change_expected.clone(),
            };
            // The main window only appears after login, however long that takes.
            let ctx = TaskContext {
                timeout: Duration::MAX,
                ..ctx
            };
            let cancel = self.shutdown.child_token();
            self.services.push(tokio::spawn(async move {
                let sink = InfoSink::disabled();
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    result = run_configuration_action(&ctx, &sink, action) => match result {
                        Ok(()) => info!("API settings applied"),
                        Err(e) => error!(error = %e, "failed to apply API settings"),
                    },
                }
            }));
        }

        Ok(server_addr)
    }

    /// Stops the services and the UI lane.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for service in self.services {
            let _ = service.await;
        }
        let lane = self.lane;
        let _ = tokio::task::spawn_blocking(move || lane.shutdown()).await;
        info!("controller stopped");
    }
}
