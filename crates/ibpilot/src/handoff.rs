//! Cells that let background threads wait for a window.
//!
//! Windows such as the main frame or the configuration dialog are created
//! once and reused for the life of the process, so the first recognised
//! instance is kept and every later waiter gets it straight away. The login
//! frame is recreated after a forced logoff, so its cell tracks the latest
//! instance instead.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::errors::AutomationError;
use crate::ui::WindowRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedWindow {
    MainWindow,
    ConfigDialog,
    LoginFrame,
}

impl NamedWindow {
    pub const ALL: [NamedWindow; 3] = [
        NamedWindow::MainWindow,
        NamedWindow::ConfigDialog,
        NamedWindow::LoginFrame,
    ];

    /// Whether a newer recognised window supersedes the recorded one.
    fn is_replaceable(self) -> bool {
        self == NamedWindow::LoginFrame
    }

    fn index(self) -> usize {
        match self {
            NamedWindow::MainWindow => 0,
            NamedWindow::ConfigDialog => 1,
            NamedWindow::LoginFrame => 2,
        }
    }
}

impl fmt::Display for NamedWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NamedWindow::MainWindow => "main window",
            NamedWindow::ConfigDialog => "configuration dialog",
            NamedWindow::LoginFrame => "login frame",
        })
    }
}

#[derive(Default)]
struct WindowCell {
    slot: Mutex<Option<WindowRef>>,
    ready: Condvar,
    ready_async: Notify,
}

impl WindowCell {
    fn fulfil(&self, window: WindowRef, replace: bool) -> bool {
        let mut slot = self.slot.lock();
        match *slot {
            Some(current) if current == window || !replace => return false,
            _ => {}
        }
        *slot = Some(window);
        self.ready.notify_all();
        self.ready_async.notify_waiters();
        true
    }

    fn wait(&self) -> WindowRef {
        let mut slot = self.slot.lock();
        loop {
            if let Some(window) = *slot {
                return window;
            }
            self.ready.wait(&mut slot);
        }
    }

    /// A timeout too large to express as a deadline waits forever.
    fn wait_for(&self, timeout: Duration) -> Option<WindowRef> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.wait());
        };
        let mut slot = self.slot.lock();
        loop {
            if let Some(window) = *slot {
                return Some(window);
            }
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                return *slot;
            }
        }
    }
}

/// One cell per [`NamedWindow`], shared by the dispatcher and any waiter.
#[derive(Default)]
pub struct NamedWindows {
    cells: [WindowCell; 3],
}

impl NamedWindows {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn cell(&self, name: NamedWindow) -> &WindowCell {
        &self.cells[name.index()]
    }

    /// Non-blocking peek.
    pub fn get(&self, name: NamedWindow) -> Option<WindowRef> {
        *self.cell(name).slot.lock()
    }

    /// Blocks the calling thread until `name` has been recognised.
    pub fn wait(&self, name: NamedWindow) -> WindowRef {
        self.cell(name).wait()
    }

    /// Bounded wait; expiry is reported as [`AutomationError::NotAvailable`].
    pub fn wait_timeout(
        &self,
        name: NamedWindow,
        timeout: Duration,
    ) -> Result<WindowRef, AutomationError> {
        self.cell(name)
            .wait_for(timeout)
            .ok_or_else(|| AutomationError::NotAvailable(name.to_string()))
    }

    /// Bounded wait for async callers. Dropping the future abandons the wait.
    pub async fn wait_async(
        &self,
        name: NamedWindow,
        timeout: Duration,
    ) -> Result<WindowRef, AutomationError> {
        let cell = self.cell(name);
        let fulfilled = async {
            loop {
                let notified = cell.ready_async.notified();
                tokio::pin!(notified);
                // Register before checking so a fulfil in between is not missed.
                notified.as_mut().enable();
                let current = *cell.slot.lock();
                if let Some(window) = current {
                    return window;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, fulfilled)
            .await
            .map_err(|_| AutomationError::NotAvailable(name.to_string()))
    }

    /// Records the window recognised as `name`. Only the login frame is ever
    /// replaced; for the others the first recognised window is kept.
    pub(crate) fn fulfil(&self, name: NamedWindow, window: WindowRef) -> bool {
        let recorded = self.cell(name).fulfil(window, name.is_replaceable());
        if recorded {
            info!(%name, %window, "named window available");
        } else {
            debug!(%name, %window, "named window already recorded");
        }
        recorded
    }
}
