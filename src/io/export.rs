//! CSV export for the notification history.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use chrono::SecondsFormat;

use crate::sim::notifier::LoggedNotification;

/// Column header for the history CSV.
const HEADER: &str = "seq,timestamp,event,payload";

/// Exports the notification history to a CSV file at the given path.
///
/// Writes a header row followed by one row per notification, in delivery
/// order. The payload column holds the notification fields as JSON.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_history_csv(entries: &[LoggedNotification], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_history_csv(entries, buf)
}

/// Writes the notification history as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing or payload serialization fails.
pub fn write_history_csv(entries: &[LoggedNotification], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(','))?;

    for e in entries {
        let payload = serde_json::to_string(&e.notification.fields())?;
        wtr.write_record(&[
            e.seq.to_string(),
            e.at.to_rfc3339_opts(SecondsFormat::Millis, true),
            e.notification.event_name().to_string(),
            payload,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
