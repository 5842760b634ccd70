//! Reads the event log back for `fintiva activity`.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{TimeDelta, Utc};

use super::events::{ActivityEvent, EventKind};

/// Read all events from `path`.
///
/// Silently skips malformed lines. Returns an empty vec if the file does not
/// exist or cannot be read.
pub fn read_all_events(path: &Path) -> Vec<ActivityEvent> {
    let Ok(file) = fs::File::open(path) else {
        return Vec::new();
    };

    BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter_map(|line| serde_json::from_str::<ActivityEvent>(&line).ok())
        .collect()
}

/// Read events from the last `days` days (all events when `None`).
pub fn read_events_since_days(path: &Path, days: Option<u32>) -> Vec<ActivityEvent> {
    let events = read_all_events(path);

    let Some(days) = days else {
        return events;
    };

    let Some(cutoff) = TimeDelta::try_days(i64::from(days))
        .and_then(|window| Utc::now().checked_sub_signed(window))
    else {
        return events;
    };
    let cutoff = cutoff.to_rfc3339();
    events
        .into_iter()
        .filter(|e| e.timestamp >= cutoff)
        .collect()
}

/// Number of events per kind.
pub fn count_by_kind(events: &[ActivityEvent]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for event in events {
        *counts.entry(event.kind.to_string()).or_insert(0) += 1;
    }
    counts
}

/// The `n` most recent events, newest first.
pub fn latest(events: &[ActivityEvent], n: usize) -> Vec<&ActivityEvent> {
    events.iter().rev().take(n).collect()
}

/// Failed submissions and metrics fetches, the events worth a second look.
pub fn failures(events: &[ActivityEvent]) -> usize {
    events
        .iter()
        .filter(|e| {
            matches!(
                e.kind,
                EventKind::FormFailed | EventKind::MetricsFetchFailed | EventKind::LoginFailed
            )
        })
        .count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
