//! # Log Export
//!
//! Serialises the data log for downstream tooling.
//!
//! The CSV header names and their order are a stable contract. A deployment
//! may export a subset of columns, but the survivors always appear in the
//! canonical order under the canonical names. Absent fields are empty cells.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Deserialize;

use super::log::LogRow;
use crate::error::Result;

/// On-disk export format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Delimited table with a header row
    Csv,
    /// One JSON object per row
    Jsonl,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Jsonl => "jsonl",
        }
    }
}

/// Exportable log columns, declared in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogColumn {
    Time,
    Temperature,
    MassFlow,
    PumpSpeed,
    EngineSpeed,
    ShutoffAngle,
    PropaneAngle,
    Status,
    Timestamp,
}

impl LogColumn {
    pub const ALL: [LogColumn; 9] = [
        LogColumn::Time,
        LogColumn::Temperature,
        LogColumn::MassFlow,
        LogColumn::PumpSpeed,
        LogColumn::EngineSpeed,
        LogColumn::ShutoffAngle,
        LogColumn::PropaneAngle,
        LogColumn::Status,
        LogColumn::Timestamp,
    ];

    /// Header cell text
    pub fn header(self) -> &'static str {
        match self {
            LogColumn::Time => "Time (s)",
            LogColumn::Temperature => "Temperature (°C)",
            LogColumn::MassFlow => "Mass Flow Rate (g/s)",
            LogColumn::PumpSpeed => "Pump Speed (%)",
            LogColumn::EngineSpeed => "Engine Speed (%)",
            LogColumn::ShutoffAngle => "Shutoff Angle (°)",
            LogColumn::PropaneAngle => "Propane Angle (°)",
            LogColumn::Status => "Status",
            LogColumn::Timestamp => "Timestamp",
        }
    }

    /// Config-file name of the column
    pub fn name(self) -> &'static str {
        match self {
            LogColumn::Time => "time",
            LogColumn::Temperature => "temperature",
            LogColumn::MassFlow => "mass_flow",
            LogColumn::PumpSpeed => "pump_speed",
            LogColumn::EngineSpeed => "engine_speed",
            LogColumn::ShutoffAngle => "shutoff_angle",
            LogColumn::PropaneAngle => "propane_angle",
            LogColumn::Status => "status",
            LogColumn::Timestamp => "timestamp",
        }
    }

    pub fn from_name(name: &str) -> Option<LogColumn> {
        LogColumn::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Cell text for `row`; empty when the row does not carry this field
    fn cell(self, row: &LogRow) -> String {
        match self {
            LogColumn::Time => row.sample_index.to_string(),
            LogColumn::Temperature => float_cell(row.temperature),
            LogColumn::MassFlow => float_cell(row.mass_flow),
            LogColumn::PumpSpeed => int_cell(row.pump_speed),
            LogColumn::EngineSpeed => int_cell(row.engine_speed),
            LogColumn::ShutoffAngle => int_cell(row.shutoff_angle),
            LogColumn::PropaneAngle => int_cell(row.propane_angle),
            LogColumn::Status => row.status.as_deref().map(quote).unwrap_or_default(),
            LogColumn::Timestamp => quote(&row.timestamp),
        }
    }
}

// Debug keeps a trailing ".0" on whole numbers
fn float_cell(value: Option<f64>) -> String {
    value.map(|v| format!("{:?}", v)).unwrap_or_default()
}

fn int_cell(value: Option<i32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn quote(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

/// Sort and dedup a column selection; empty means every column
fn canonical_columns(columns: &[LogColumn]) -> Vec<LogColumn> {
    if columns.is_empty() {
        return LogColumn::ALL.to_vec();
    }
    let mut selected = columns.to_vec();
    selected.sort();
    selected.dedup();
    selected
}

/// Write rows as a CSV table
///
/// # Arguments
///
/// * `rows` - Log rows in sample order
/// * `columns` - Column subset; empty exports every column
/// * `out` - Destination
pub fn export_csv<W: Write>(rows: &[LogRow], columns: &[LogColumn], mut out: W) -> io::Result<()> {
    let columns = canonical_columns(columns);

    let header: Vec<&str> = columns.iter().map(|c| c.header()).collect();
    writeln!(out, "{}", header.join(","))?;

    for row in rows {
        let cells: Vec<String> = columns.iter().map(|c| c.cell(row)).collect();
        writeln!(out, "{}", cells.join(","))?;
    }

    out.flush()
}

/// Render rows as a CSV string
pub fn render_csv(rows: &[LogRow], columns: &[LogColumn]) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail
    let _ = export_csv(rows, columns, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Write rows as JSON Lines, absent fields omitted
pub fn export_jsonl<W: Write>(rows: &[LogRow], mut out: W) -> Result<()> {
    for row in rows {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Export rows to a file in the requested format
pub fn export_to_file<P: AsRef<Path>>(
    path: P,
    rows: &[LogRow],
    format: ExportFormat,
    columns: &[LogColumn],
) -> Result<()> {
    let out = BufWriter::new(File::create(path)?);
    match format {
        ExportFormat::Csv => export_csv(rows, columns, out)?,
        ExportFormat::Jsonl => export_jsonl(rows, out)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::protocol::TelemetryEvent;

    fn sample_rows() -> Vec<LogRow> {
        vec![
            LogRow::from_event(0, "2026-10-19 12:00:00.000".into(), &TelemetryEvent::Temperature(21.5)),
            LogRow::from_event(1, "2026-10-19 12:00:00.100".into(), &TelemetryEvent::PumpSpeed(40)),
            LogRow::from_event(2, "2026-10-19 12:00:00.200".into(), &TelemetryEvent::Temperature(22.0)),
        ]
    }

    #[test]
    fn test_full_header_order() {
        let csv = render_csv(&[], &[]);
        assert_eq!(
            csv,
            "Time (s),Temperature (°C),Mass Flow Rate (g/s),Pump Speed (%),Engine Speed (%),\
             Shutoff Angle (°),Propane Angle (°),Status,Timestamp\n"
        );
    }

    #[test]
    fn test_rows_render_sparse_cells() {
        let csv = render_csv(&sample_rows(), &[]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "0,21.5,,,,,,,2026-10-19 12:00:00.000");
        assert_eq!(lines[2], "1,,,40,,,,,2026-10-19 12:00:00.100");
        assert_eq!(lines[3], "2,22.0,,,,,,,2026-10-19 12:00:00.200");
    }

    #[test]
    fn test_column_subset_keeps_canonical_order() {
        let columns = [LogColumn::Timestamp, LogColumn::Temperature, LogColumn::Time, LogColumn::Temperature];
        let csv = render_csv(&sample_rows()[..1], &columns);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Time (s),Temperature (°C),Timestamp");
        assert_eq!(lines[1], "0,21.5,2026-10-19 12:00:00.000");
    }

    #[test]
    fn test_status_cells_are_quoted_when_needed() {
        let row = LogRow::from_event(0, "t".into(), &TelemetryEvent::Status("HOLD, \"manual\"".into()));
        let csv = render_csv(&[row], &[LogColumn::Status]);
        assert_eq!(csv.lines().nth(1), Some("\"HOLD, \"\"manual\"\"\""));
    }

    #[test]
    fn test_column_names_round_trip() {
        for column in LogColumn::ALL {
            assert_eq!(LogColumn::from_name(column.name()), Some(column));
        }
        assert_eq!(LogColumn::from_name("humidity"), None);
    }

    #[test]
    fn test_jsonl_one_object_per_row() {
        let mut buf = Vec::new();
        export_jsonl(&sample_rows(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["sample_index"], 1);
        assert_eq!(second["pump_speed"], 40);
        assert!(second.get("temperature").is_none());
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");

        export_to_file(&path, &sample_rows(), ExportFormat::Csv, &[]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("Time (s),"));
        assert_eq!(contents.lines().count(), 4);
    }

    #[test]
    fn test_format_extensions() {
        assert_eq!(ExportFormat::Csv.extension(), "csv");
        assert_eq!(ExportFormat::Jsonl.extension(), "jsonl");
    }
}
