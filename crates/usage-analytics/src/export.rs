//! CSV export of the full record set, shaped for spreadsheet import.

use chrono::{DateTime, Utc};
use usage_core::record::{parse_timestamp, SessionRecord};

/// Column order of the export, fixed for existing spreadsheet imports.
const CSV_HEADER: [&str; 13] = [
    "User ID",
    "Session Start",
    "Session End",
    "Duration (minutes)",
    "Age",
    "Gender",
    "Location",
    "Cancer Type",
    "Cancer Stage",
    "Comorbidities",
    "Prior Treatments",
    "Messages Sent",
    "Trials Found",
];

/// Render the full record set as CSV, one row per record in store order.
/// An empty store still produces the header line.
pub fn export_csv(records: &[SessionRecord]) -> String {
    let mut output = String::new();
    push_row(&mut output, CSV_HEADER);

    for record in records {
        push_row(
            &mut output,
            [
                record.user_id.clone(),
                format_export_timestamp(&record.session_start),
                record
                    .session_end
                    .as_deref()
                    .map(format_export_timestamp)
                    .unwrap_or_default(),
                format_duration_minutes(record.total_duration_seconds),
                format_age(record.age),
                record.gender.clone().unwrap_or_default(),
                record.location.clone().unwrap_or_default(),
                record.cancer_type.clone().unwrap_or_default(),
                record.cancer_stage.clone().unwrap_or_default(),
                record.comorbidities.join(", "),
                record.prior_treatments.join(", "),
                record.messages_sent.to_string(),
                record.trials_found.to_string(),
            ],
        );
    }

    output
}

/// Download filename for the CSV export, stamped to the second.
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("chatbot_usage_stats_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

fn push_row<I, S>(output: &mut String, fields: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut first = true;
    for field in fields {
        if !first {
            output.push(',');
        }
        output.push_str(&escape_field(field.as_ref()));
        first = false;
    }
    output.push_str("\r\n");
}

/// Quote a field when it contains a delimiter, quote, or line break;
/// embedded quotes are doubled.
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Reformat a stored ISO-8601 timestamp for spreadsheets. Unparseable
/// values pass through verbatim.
fn format_export_timestamp(value: &str) -> String {
    match parse_timestamp(value) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => {
            tracing::warn!("Unparseable timestamp in export: {}", value);
            value.to_string()
        }
    }
}

/// Seconds to minutes, one decimal place. Blank when the duration is unknown.
fn format_duration_minutes(seconds: Option<f64>) -> String {
    match seconds {
        Some(secs) => format!("{:.1}", secs / 60.0),
        None => String::new(),
    }
}

/// Whole-number ages render without a decimal point.
fn format_age(age: Option<f64>) -> String {
    match age {
        None => String::new(),
        Some(a) if a.fract() == 0.0 => format!("{}", a as i64),
        Some(a) => a.to_string(),
    }
}
