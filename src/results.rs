//! Result table shared by the timing harness and the plotter.
//!
//! # Format
//!
//! ```text
//! size,cpu_seconds,accelerator_seconds
//! 1000000,0.000913,absent
//! 5000000,0.004871,absent
//! ```
//!
//! One row per measured size in test order. `absent` marks a size the
//! accelerator did not measure; it is distinct from a zero timing.

use crate::artifact;
use crate::error::{PipelineError, Result};
use crate::schema::TimingRecord;
use std::fs::File;
use std::path::Path;

/// Header row of the table.
pub const HEADER: [&str; 3] = ["size", "cpu_seconds", "accelerator_seconds"];

/// Accelerator column value for "not measured".
pub const ABSENT_MARKER: &str = "absent";

/// Serialize records into table bytes.
pub fn encode(records: &[TimingRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for r in records {
        let accelerator = r
            .accelerator_seconds
            .map(|s| s.to_string())
            .unwrap_or_else(|| ABSENT_MARKER.to_string());
        writer.write_record([r.size.to_string(), r.cpu_seconds.to_string(), accelerator])?;
    }
    writer
        .into_inner()
        .map_err(|e| PipelineError::Csv(e.into_error().into()))
}

/// Replace the table at `path`.
pub fn write_results(path: &Path, records: &[TimingRecord]) -> Result<()> {
    let bytes = encode(records)?;
    artifact::write_atomic(path, &bytes)
}

fn parse_seconds(field: &str, column: &str) -> std::result::Result<f64, String> {
    let value: f64 = field
        .parse()
        .map_err(|_| format!("{column} is not a number: {field:?}"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{column} must be a non-negative number, got {field}"));
    }
    Ok(value)
}

fn parse_row(record: &csv::StringRecord) -> std::result::Result<TimingRecord, String> {
    if record.len() != HEADER.len() {
        return Err(format!(
            "expected {} columns, found {}",
            HEADER.len(),
            record.len()
        ));
    }
    let size: usize = record[0]
        .parse()
        .map_err(|_| format!("size is not an integer: {:?}", &record[0]))?;
    if size == 0 {
        return Err("size must be positive".to_string());
    }
    let cpu_seconds = parse_seconds(&record[1], "cpu_seconds")?;
    let accelerator_seconds = match &record[2] {
        ABSENT_MARKER => None,
        field => Some(parse_seconds(field, "accelerator_seconds")?),
    };
    Ok(TimingRecord {
        size,
        cpu_seconds,
        accelerator_seconds,
    })
}

/// Read the table at `path`. The header line is skipped.
///
/// A missing file, an empty table or any malformed row is an error.
pub fn read_results(path: &Path) -> Result<Vec<TimingRecord>> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        let record = parse_row(&row).map_err(|reason| PipelineError::MalformedResults {
            path: path.to_path_buf(),
            line,
            reason,
        })?;
        records.push(record);
    }

    if records.is_empty() {
        return Err(PipelineError::MalformedResults {
            path: path.to_path_buf(),
            line: 1,
            reason: "no result rows".to_string(),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn sample() -> Vec<TimingRecord> {
        vec![
            TimingRecord {
                size: 1_000,
                cpu_seconds: 0.000125,
                accelerator_seconds: Some(0.5),
            },
            TimingRecord {
                size: 5_000,
                cpu_seconds: 0.000625,
                accelerator_seconds: None,
            },
        ]
    }

    #[test]
    fn test_encode_layout() {
        let text = String::from_utf8(encode(&sample()).unwrap()).unwrap();
        assert_eq!(
            text,
            "size,cpu_seconds,accelerator_seconds\n1000,0.000125,0.5\n5000,0.000625,absent\n"
        );
    }

    #[test]
    fn test_write_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("performance").join("results.txt");

        write_results(&path, &sample()).unwrap();
        assert_eq!(read_results(&path).unwrap(), sample());
    }

    #[test]
    fn test_rewrite_replaces_previous_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.txt");

        write_results(&path, &sample()).unwrap();
        write_results(&path, &sample()[..1]).unwrap();
        assert_eq!(read_results(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = read_results(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }

    #[test]
    fn test_malformed_rows_report_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        fs::write(
            &path,
            "size,cpu_seconds,accelerator_seconds\n1000,0.1,absent\n2000,fast,absent\n",
        )
        .unwrap();

        match read_results(&path).unwrap_err() {
            PipelineError::MalformedResults { line, reason, .. } => {
                assert_eq!(line, 3);
                assert!(reason.contains("cpu_seconds"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_short_rows_and_negative_times() {
        let dir = tempdir().unwrap();
        for body in ["1000,0.1\n", "1000,-0.1,absent\n", "0,0.1,absent\n", "1000,0.1,None\n"] {
            let path = dir.path().join("bad.txt");
            fs::write(&path, format!("size,cpu_seconds,accelerator_seconds\n{body}")).unwrap();
            assert!(
                matches!(read_results(&path), Err(PipelineError::MalformedResults { .. })),
                "row {body:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_header_only_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        fs::write(&path, "size,cpu_seconds,accelerator_seconds\n").unwrap();
        assert!(matches!(
            read_results(&path),
            Err(PipelineError::MalformedResults { .. })
        ));
    }
}
