//! Weekly scheduled closedown (`ClosedownAt`).

use std::time::Duration;

use chrono::{DateTime, Datelike, Days, Local, TimeZone};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::ClosedownAt;
use crate::tasks::{self, InfoSink, TaskContext};

/// The first moment strictly after `now` matching `at`, in `now`'s timezone.
pub fn next_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, at: ClosedownAt) -> Option<DateTime<Tz>> {
    let today = now.date_naive();
    let days_ahead = (at.weekday.num_days_from_monday() + 7 - today.weekday().num_days_from_monday()) % 7;
    let mut date = today.checked_add_days(Days::new(days_ahead.into()))?;

    loop {
        let candidate = now
            .timezone()
            .from_local_datetime(&date.and_time(at.time))
            .earliest();
        match candidate {
            Some(when) if when > *now => return Some(when),
            _ => date = date.checked_add_days(Days::new(7))?,
        }
    }
}

/// Issues a STOP at the next `at`. Cancelling `cancel` abandons the timer.
pub fn spawn_closedown(at: ClosedownAt, ctx: TaskContext, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let now = Local::now();
        let Some(when) = next_occurrence(&now, at) else {
            warn!(%at, "cannot compute the next closedown time");
            return;
        };
        let delay = (when.clone() - now).to_std().unwrap_or(Duration::ZERO);
        info!(%at, when = %when.to_rfc3339(), "closedown scheduled");

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        info!("closedown time reached; stopping");
        match tasks::stop(&ctx, &InfoSink::disabled()).await {
            Ok(()) => info!("closedown requested"),
            Err(e) => error!(error = %e, "scheduled closedown failed"),
        }
    })
}
