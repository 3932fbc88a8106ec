//! One-line rendering of stack events

use chrono::SecondsFormat;
use clusterstack_models::{StackEvent, StackStatus};

/// Status column width; longer statuses push the line out rather than being cut
const STATUS_WIDTH: usize = 28;

/// Render `event` as `<timestamp>  <STATUS>  <logical id>[  <reason>]`.
///
/// Never fails. Unrecognized statuses are printed as the backend reported them and
/// line breaks in the reason are flattened so the result is always a single line.
pub fn format_event(event: &StackEvent) -> String {
    let mut line = format!(
        "{}  {:<width$}  {}",
        event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        event.resource_status.as_str(),
        event.logical_resource_id,
        width = STATUS_WIDTH,
    );

    let reason = event.resource_status_reason.trim();
    if !reason.is_empty() {
        line.push_str("  ");
        line.extend(reason.chars().map(|c| if c.is_control() { ' ' } else { c }));
    }
    line
}

/// Recover `(logical resource id, status)` from a line produced by [`format_event`].
///
/// Columns are read by position, so an empty status still parses.
pub fn parse_event_line(line: &str) -> Option<(String, StackStatus)> {
    let (timestamp, rest) = line.split_once("  ")?;
    if timestamp.is_empty() || timestamp.contains(' ') {
        return None;
    }

    let status_len = rest.find(' ').unwrap_or(rest.len());
    let status = &rest[..status_len];
    let rest = rest.get(status_len.max(STATUS_WIDTH)..)?.strip_prefix("  ")?;

    let logical_id = rest.split(' ').next().filter(|id| !id.is_empty())?;
    Some((logical_id.to_string(), StackStatus::from(status)))
}
