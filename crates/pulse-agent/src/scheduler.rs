//! Drain-and-write flush logic plus the re-armable flush timer.

use std::path::PathBuf;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use pulse_core::{ActivityBuffer, Snapshot};
use pulse_store::StorePaths;

/// What one flush attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Aggregation is disabled; nothing was drained or written.
    Skipped,
    /// The buffer was empty.
    NoActivity,
    /// A snapshot was written at this path.
    Written(PathBuf),
}

/// Drain the buffer and write a snapshot for the current instant.
///
/// The drain happens before the write, so on a write error the activity is
/// already gone — accepted loss, the caller surfaces the warning.
pub fn flush_now(
    buffer: &mut ActivityBuffer,
    paths: &StorePaths,
    enabled: bool,
) -> anyhow::Result<FlushOutcome> {
    if !enabled {
        return Ok(FlushOutcome::Skipped);
    }
    let Some(drain) = buffer.drain() else {
        return Ok(FlushOutcome::NoActivity);
    };

    let now = OffsetDateTime::now_utc();
    let snapshot = Snapshot::from_drain(&drain, now);
    let path = paths.snapshot_path(now);
    let json = serde_json::to_vec_pretty(&snapshot)?;
    pulse_store::write_atomic(&path, &json)?;
    Ok(FlushOutcome::Written(path))
}

/// Build the repeating flush timer. The first tick fires one full period
/// from now, so re-arming after a config change never causes an immediate
/// flush; dropping the old interval and installing this one leaves exactly
/// one timer running.
pub fn flush_timer(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
