//! The single serialized execution lane for all widget access.
//!
//! Window-event handling and externally submitted GUI tasks share one FIFO
//! queue drained by a dedicated thread. The facade is owned by that thread and
//! is only reachable through the [`Lane`] passed to each task, so widget state
//! can never be touched concurrently.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use crate::errors::AutomationError;
use crate::ui::UiFacade;

pub type GuiTask = Box<dyn FnOnce(&Lane<'_>) + Send + 'static>;

/// What a task sees while it holds the lane.
pub struct Lane<'a> {
    ui: &'a dyn UiFacade,
    executor: &'a UiExecutor,
}

impl<'a> Lane<'a> {
    pub fn ui(&self) -> &'a dyn UiFacade {
        self.ui
    }

    /// Handle for queueing follow-up work, e.g. the next poll of a retry loop.
    pub fn executor(&self) -> &'a UiExecutor {
        self.executor
    }
}

enum LaneMessage {
    Run(&'static str, GuiTask),
    RunAfter(Instant, &'static str, GuiTask),
    Shutdown,
}

struct Delayed {
    due: Instant,
    seq: u64,
    name: &'static str,
    task: GuiTask,
}

impl PartialEq for Delayed {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Delayed {}

impl PartialOrd for Delayed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Delayed {
    // Reversed so the max-heap pops the earliest deadline first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Cheap, cloneable producer side of the UI lane.
#[derive(Clone)]
pub struct UiExecutor {
    tx: Sender<LaneMessage>,
}

impl UiExecutor {
    /// Starts the lane thread, handing it sole ownership of `ui`.
    pub fn spawn(ui: Box<dyn UiFacade>) -> std::io::Result<LaneHandle> {
        let (tx, rx) = mpsc::channel();
        let executor = UiExecutor { tx };
        let lane_executor = executor.clone();
        let thread = std::thread::Builder::new()
            .name("ui-lane".to_string())
            .spawn(move || run_lane(ui, rx, lane_executor))?;
        Ok(LaneHandle {
            executor,
            thread: Some(thread),
        })
    }

    /// Enqueues `task` behind everything already queued. Never blocks.
    pub fn submit<F>(&self, name: &'static str, task: F)
    where
        F: FnOnce(&Lane<'_>) + Send + 'static,
    {
        if self.tx.send(LaneMessage::Run(name, Box::new(task))).is_err() {
            warn!(task = name, "UI lane has stopped; dropping task");
        }
    }

    /// Enqueues `task` at the tail of the queue once `delay` has elapsed.
    pub fn submit_after<F>(&self, delay: Duration, name: &'static str, task: F)
    where
        F: FnOnce(&Lane<'_>) + Send + 'static,
    {
        let due = Instant::now() + delay;
        if self
            .tx
            .send(LaneMessage::RunAfter(due, name, Box::new(task)))
            .is_err()
        {
            warn!(task = name, "UI lane has stopped; dropping delayed task");
        }
    }

    /// Runs `f` on the lane and resolves to its result.
    pub fn call<F, R>(
        &self,
        name: &'static str,
        f: F,
    ) -> impl Future<Output = Result<R, AutomationError>> + Send + 'static
    where
        F: FnOnce(&Lane<'_>) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(name, move |lane| {
            let _ = tx.send(f(lane));
        });
        async move {
            rx.await
                .map_err(|_| AutomationError::TaskAborted(name.to_string()))
        }
    }

    /// Thread-blocking counterpart of [`UiExecutor::call`]. Must not be called from the lane.
    pub fn call_blocking<F, R>(&self, name: &'static str, f: F) -> Result<R, AutomationError>
    where
        F: FnOnce(&Lane<'_>) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(name, move |lane| {
            let _ = tx.send(f(lane));
        });
        rx.blocking_recv()
            .map_err(|_| AutomationError::TaskAborted(name.to_string()))
    }

    fn shutdown(&self) {
        let _ = self.tx.send(LaneMessage::Shutdown);
    }
}

/// Owner of the lane thread; stopping happens on [`LaneHandle::shutdown`] or drop.
pub struct LaneHandle {
    executor: UiExecutor,
    thread: Option<JoinHandle<()>>,
}

impl LaneHandle {
    pub fn executor(&self) -> UiExecutor {
        self.executor.clone()
    }

    /// Stops accepting work after the tasks already queued and joins the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.executor.shutdown();
            if thread.join().is_err() {
                error!("UI lane thread terminated abnormally");
            }
        }
    }
}

impl Drop for LaneHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_lane(ui: Box<dyn UiFacade>, rx: Receiver<LaneMessage>, executor: UiExecutor) {
    let lane = Lane {
        ui: ui.as_ref(),
        executor: &executor,
    };
    let mut delayed = BinaryHeap::new();
    let mut seq = 0u64;
    debug!("UI lane started");

    loop {
        let next_due = delayed.peek().map(|next: &Delayed| next.due);
        let message = match next_due {
            Some(due) => {
                let now = Instant::now();
                if due <= now {
                    if let Some(Delayed { name, task, .. }) = delayed.pop() {
                        // Back of the queue, behind anything that arrived meanwhile.
                        executor.submit(name, task);
                    }
                    continue;
                }
                match rx.recv_timeout(due - now) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(message) => message,
                Err(_) => break,
            },
        };

        match message {
            LaneMessage::Run(name, task) => run_task(&lane, name, task),
            LaneMessage::RunAfter(due, name, task) => {
                seq += 1;
                delayed.push(Delayed {
                    due,
                    seq,
                    name,
                    task,
                });
            }
            LaneMessage::Shutdown => break,
        }
    }

    if !delayed.is_empty() {
        debug!(pending = delayed.len(), "UI lane stopping with delayed tasks pending");
    }
    debug!("UI lane stopped");
}

fn run_task(lane: &Lane<'_>, name: &'static str, task: GuiTask) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| task(lane))) {
        error!(task = name, reason = %panic_message(panic.as_ref()), "UI task panicked");
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
