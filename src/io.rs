//! Tabular input and output
//!
//! All four inputs and the labeled output are CSV. Readers locate columns by
//! header name; a required column that is absent aborts the run. Empty cells
//! and `nan` are read as missing values and written back as empty cells.

use crate::error::LabelError;
use crate::timeline::{format_timestamp, parse_timestamp};
use crate::types::{LabeledTable, NormalizationStats, TimestepRow, TimestepTable, VentilationEvent};
use csv::StringRecord;
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Encounter id column in the per-timestep series
pub const ENCOUNTER_COLUMN: &str = "encounter";
/// Time step column in the per-timestep series
pub const TIME_STEP_COLUMN: &str = "time_step";
/// Absolute observation time column in the per-timestep series
pub const OBSERVED_AT_COLUMN: &str = "start_time";

pub const EVENT_ENCOUNTER_COLUMN: &str = "eid";
pub const EVENT_START_COLUMN: &str = "start";
pub const EVENT_END_COLUMN: &str = "end";
pub const EVENT_SUCCESS_COLUMN: &str = "intubation_success_bool";

pub const STATS_NAME_COLUMN: &str = "event_name";
pub const STATS_MEAN_COLUMN: &str = "mean";
pub const STATS_STD_COLUMN: &str = "std";

/// Episode and offset columns appended after the targets in the output
pub const OUTPUT_TRAILING_COLUMNS: [&str; 4] = [
    "start",
    "end",
    "offset_from_intubation_start",
    "offset_from_extubation",
];

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn header_index(headers: &StringRecord, column: &str, input: &str) -> Result<usize, LabelError> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| LabelError::missing_column(column, input))
}

fn field<'r>(record: &'r StringRecord, index: usize) -> &'r str {
    record.get(index).unwrap_or("")
}

fn is_missing(text: &str) -> bool {
    text.is_empty()
        || text.eq_ignore_ascii_case("nan")
        || text.eq_ignore_ascii_case("na")
        || text.eq_ignore_ascii_case("null")
}

/// Parse a numeric cell; missing markers become `None`
pub fn parse_optional_f64(text: &str, context: &str) -> Result<Option<f64>, LabelError> {
    if is_missing(text) {
        return Ok(None);
    }
    text.parse::<f64>()
        .map(Some)
        .map_err(|_| LabelError::InvalidValue(format!("{}: '{}' is not a number", context, text)))
}

fn parse_required_f64(text: &str, context: &str) -> Result<f64, LabelError> {
    parse_optional_f64(text, context)?
        .ok_or_else(|| LabelError::InvalidValue(format!("{}: value is missing", context)))
}

/// Parse a success flag. A missing flag counts as unsuccessful.
pub fn parse_success_flag(text: &str, context: &str) -> Result<bool, LabelError> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" | "1.0" | "t" | "yes" => Ok(true),
        "false" | "0" | "0.0" | "f" | "no" => Ok(false),
        other if is_missing(other) => Ok(false),
        other => Err(LabelError::InvalidValue(format!(
            "{}: '{}' is not a boolean",
            context, other
        ))),
    }
}

fn parse_time_step(text: &str, context: &str) -> Result<i64, LabelError> {
    if let Ok(step) = text.parse::<i64>() {
        return Ok(step);
    }
    match text.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.is_finite() => Ok(v as i64),
        _ => Err(LabelError::InvalidValue(format!(
            "{}: '{}' is not an integer time step",
            context, text
        ))),
    }
}

/// Read ventilation events (Input A)
pub fn read_events<R: Read>(reader: R, input: &str) -> Result<Vec<VentilationEvent>, LabelError> {
    let mut rdr = csv_reader(reader);
    let headers = rdr.headers()?.clone();
    let encounter = header_index(&headers, EVENT_ENCOUNTER_COLUMN, input)?;
    let start = header_index(&headers, EVENT_START_COLUMN, input)?;
    let end = header_index(&headers, EVENT_END_COLUMN, input)?;
    let success = header_index(&headers, EVENT_SUCCESS_COLUMN, input)?;

    let mut events = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let context = format!("{} row {}", input, line + 1);
        events.push(VentilationEvent {
            encounter: field(&record, encounter).to_string(),
            start: field(&record, start).to_string(),
            end: field(&record, end).to_string(),
            success: parse_success_flag(field(&record, success), &context)?,
        });
    }

    tracing::debug!(input, events = events.len(), "read ventilation events");
    Ok(events)
}

/// Read a per-timestep series (Input C).
///
/// Every column other than the three key columns is read as a numeric
/// feature, in file order.
pub fn read_timestep_table<R: Read>(reader: R, input: &str) -> Result<TimestepTable, LabelError> {
    read_series(reader, input, None)
}

/// Read only the named value columns of a per-timestep series (Input B).
///
/// Other columns are never parsed, so they may hold text. Columns come back
/// in the order given.
pub fn read_vital_series<R: Read>(
    reader: R,
    input: &str,
    vitals: &[String],
) -> Result<TimestepTable, LabelError> {
    read_series(reader, input, Some(vitals))
}

fn read_series<R: Read>(
    reader: R,
    input: &str,
    selected: Option<&[String]>,
) -> Result<TimestepTable, LabelError> {
    let mut rdr = csv_reader(reader);
    let headers = rdr.headers()?.clone();
    let encounter = header_index(&headers, ENCOUNTER_COLUMN, input)?;
    let time_step = header_index(&headers, TIME_STEP_COLUMN, input)?;
    let observed_at = header_index(&headers, OBSERVED_AT_COLUMN, input)?;

    let value_indices: Vec<usize> = match selected {
        Some(names) => names
            .iter()
            .map(|name| header_index(&headers, name, input))
            .collect::<Result<_, _>>()?,
        None => (0..headers.len())
            .filter(|i| ![encounter, time_step, observed_at].contains(i))
            .collect(),
    };
    let columns = value_indices
        .iter()
        .map(|&i| field(&headers, i).to_string())
        .collect();

    let mut rows = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let context = format!("{} row {}", input, line + 1);

        let observed = parse_timestamp(field(&record, observed_at))
            .map_err(|e| LabelError::TimeParse(format!("{}: {}", context, e)))?;
        let values = value_indices
            .iter()
            .map(|&i| parse_optional_f64(field(&record, i), &context))
            .collect::<Result<Vec<_>, _>>()?;

        rows.push(TimestepRow {
            encounter: field(&record, encounter).to_string(),
            time_step: parse_time_step(field(&record, time_step), &context)?,
            observed_at: observed,
            values,
        });
    }

    tracing::debug!(input, rows = rows.len(), "read timestep table");
    Ok(TimestepTable { columns, rows })
}

/// Read ZMUV statistics (Input D)
pub fn read_normalization_stats<R: Read>(reader: R, input: &str) -> Result<NormalizationStats, LabelError> {
    let mut rdr = csv_reader(reader);
    let headers = rdr.headers()?.clone();
    let name = header_index(&headers, STATS_NAME_COLUMN, input)?;
    let mean = header_index(&headers, STATS_MEAN_COLUMN, input)?;
    let std = header_index(&headers, STATS_STD_COLUMN, input)?;

    let mut stats = NormalizationStats::new();
    for record in rdr.records() {
        let record = record?;
        let feature = field(&record, name);
        let context = format!("{} feature '{}'", input, feature);
        stats.insert(
            feature,
            parse_required_f64(field(&record, mean), &context)?,
            parse_required_f64(field(&record, std), &context)?,
        );
    }

    Ok(stats)
}

fn open(path: &Path) -> Result<File, LabelError> {
    File::open(path).map_err(|e| {
        LabelError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })
}

pub fn load_events(path: &Path) -> Result<Vec<VentilationEvent>, LabelError> {
    read_events(open(path)?, &path.display().to_string())
}

pub fn load_timestep_table(path: &Path) -> Result<TimestepTable, LabelError> {
    read_timestep_table(open(path)?, &path.display().to_string())
}

pub fn load_vital_series(path: &Path, vitals: &[String]) -> Result<TimestepTable, LabelError> {
    read_vital_series(open(path)?, &path.display().to_string(), vitals)
}

/// Full output header: keys, features, targets, then the episode columns.
///
/// A feature column whose name collides with a key, target or episode
/// column is rejected.
pub fn output_columns<'a>(
    feature_columns: &'a [String],
    target_columns: &'a [String],
) -> Result<Vec<&'a str>, LabelError> {
    let header: Vec<&str> = [ENCOUNTER_COLUMN, TIME_STEP_COLUMN, OBSERVED_AT_COLUMN]
        .into_iter()
        .chain(feature_columns.iter().map(String::as_str))
        .chain(target_columns.iter().map(String::as_str))
        .chain(OUTPUT_TRAILING_COLUMNS)
        .collect();

    let mut seen = HashSet::new();
    for column in &header {
        if !seen.insert(*column) {
            return Err(LabelError::ColumnConflict {
                column: column.to_string(),
                input: "preprocessed time series".to_string(),
            });
        }
    }
    Ok(header)
}

pub fn load_normalization_stats(path: &Path) -> Result<NormalizationStats, LabelError> {
    read_normalization_stats(open(path)?, &path.display().to_string())
}

fn format_optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes the labeled table, replacing any existing file
pub struct Persister {
    path: PathBuf,
}

impl Persister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write to a sibling staging file, then rename over the target, so a
    /// failed write never leaves a truncated table behind.
    pub fn write(&self, table: &LabeledTable) -> Result<(), LabelError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut staging = self.path.clone().into_os_string();
        staging.push(".partial");
        let staging = PathBuf::from(staging);

        let written = File::create(&staging)
            .map_err(LabelError::from)
            .and_then(|file| Self::write_to(table, file))
            .and_then(|()| std::fs::rename(&staging, &self.path).map_err(LabelError::from));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&staging);
            return Err(e);
        }

        tracing::info!(path = %self.path.display(), rows = table.rows.len(), "wrote labeled table");
        Ok(())
    }

    /// Write rows in table order. Pipeline output is already sorted by
    /// (encounter, time step); see [`LabeledTable::sort_by_index`].
    pub fn write_to<W: Write>(table: &LabeledTable, writer: W) -> Result<(), LabelError> {
        let header = output_columns(&table.feature_columns, &table.target_columns)?;
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&header)?;

        for labeled in &table.rows {
            let mut record: Vec<String> = Vec::with_capacity(header.len());
            record.push(labeled.row.encounter.clone());
            record.push(labeled.row.time_step.to_string());
            record.push(format_timestamp(&labeled.row.observed_at));
            record.extend(labeled.row.values.iter().map(|v| format_optional(*v)));
            record.extend(labeled.targets.iter().map(|v| format_optional(*v)));
            record.push(format_timestamp(&labeled.episode.start));
            record.push(format_timestamp(&labeled.episode.end));
            record.push(labeled.offsets.from_intubation_start.to_string());
            record.push(labeled.offsets.from_extubation.to_string());
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::Episode;
    use crate::types::LabeledRow;

    #[test]
    fn test_read_events() {
        let csv = "eid,start,end,intubation_success_bool,extra\n\
                   e1,2024-01-15 00:00:00,2024-01-15 20:00:00,True,x\n\
                   e2,2024-01-15 00:00:00,2024-01-15 20:00:00,False,y\n\
                   e3,,,,z\n";

        let events = read_events(csv.as_bytes(), "events").unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].encounter, "e1");
        assert!(events[0].success);
        assert!(!events[1].success);
        assert!(!events[2].success);
        assert_eq!(events[2].start, "");
    }

    #[test]
    fn test_read_events_missing_column() {
        let csv = "eid,start,end\ne1,a,b\n";
        let err = read_events(csv.as_bytes(), "events").unwrap_err();
        assert!(matches!(
            err,
            LabelError::MissingColumn { ref column, .. } if column == "intubation_success_bool"
        ));
    }

    #[test]
    fn test_read_timestep_table() {
        let csv = "encounter,time_step,start_time,Heart Rate,Respiratory Rate\n\
                   e1,0,2024-01-15 00:00:00,80,\n\
                   e1,1,2024-01-15 01:00:00,NaN,18.5\n";

        let table = read_timestep_table(csv.as_bytes(), "raw").unwrap();

        assert_eq!(table.columns, vec!["Heart Rate", "Respiratory Rate"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].values, vec![Some(80.0), None]);
        assert_eq!(table.rows[1].values, vec![None, Some(18.5)]);
        assert_eq!(table.rows[1].time_step, 1);
    }

    #[test]
    fn test_read_timestep_table_bad_time_is_fatal() {
        let csv = "encounter,time_step,start_time,Heart Rate\ne1,0,garbage,80\n";
        assert!(matches!(
            read_timestep_table(csv.as_bytes(), "raw"),
            Err(LabelError::TimeParse(_))
        ));
    }

    #[test]
    fn test_read_normalization_stats() {
        let csv = "event_name,mean,std\nHeart Rate,85.2,15.1\nRespiratory Rate,18,5\n";
        let stats = read_normalization_stats(csv.as_bytes(), "zmuv").unwrap();

        assert_eq!(stats.len(), 2);
        assert_eq!(stats.get("Heart Rate").unwrap().mean, 85.2);
        assert_eq!(stats.get("Respiratory Rate").unwrap().std, 5.0);
    }

    #[test]
    fn test_parse_success_flag_rejects_garbage() {
        assert!(parse_success_flag("maybe", "row 1").is_err());
        assert!(parse_success_flag("TRUE", "row 1").unwrap());
    }

    #[test]
    fn test_read_vital_series_skips_text_columns() {
        let csv = "encounter,time_step,start_time,unit,Heart Rate,Respiratory Rate\n\
                   e1,0,2024-01-15 00:00:00,MICU,80,16\n\
                   e1,1,2024-01-15 01:00:00,CCU,,17\n";
        let vitals = vec!["Respiratory Rate".to_string(), "Heart Rate".to_string()];

        let table = read_vital_series(csv.as_bytes(), "raw", &vitals).unwrap();

        assert_eq!(table.columns, vitals);
        assert_eq!(table.rows[0].values, vec![Some(16.0), Some(80.0)]);
        assert_eq!(table.rows[1].values, vec![Some(17.0), None]);

        // The all-columns reader still treats the text column as malformed
        assert!(matches!(
            read_timestep_table(csv.as_bytes(), "raw"),
            Err(LabelError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_read_vital_series_missing_vital() {
        let csv = "encounter,time_step,start_time,unit\ne1,0,2024-01-15 00:00:00,MICU\n";
        let err = read_vital_series(csv.as_bytes(), "raw", &["Heart Rate".to_string()]).unwrap_err();
        assert!(matches!(
            err,
            LabelError::MissingColumn { ref column, .. } if column == "Heart Rate"
        ));
    }

    fn make_table(feature: &str, rows: &[(&str, i64, Option<f64>)]) -> LabeledTable {
        let t0 = parse_timestamp("2024-01-15 00:00:00").unwrap();
        let episode = Episode::new(t0, t0 + chrono::TimeDelta::hours(10));
        LabeledTable {
            feature_columns: vec![feature.to_string()],
            target_columns: vec!["target_v".to_string()],
            rows: rows
                .iter()
                .map(|&(encounter, step, target)| LabeledRow {
                    row: TimestepRow {
                        encounter: encounter.to_string(),
                        time_step: step,
                        observed_at: t0 + chrono::TimeDelta::hours(step),
                        values: vec![Some(0.25)],
                    },
                    episode,
                    offsets: episode.offsets(t0 + chrono::TimeDelta::hours(step)),
                    targets: vec![target],
                })
                .collect(),
        }
    }

    #[test]
    fn test_write_rows_and_blank_missing() {
        let table = make_table("f", &[("a", 0, Some(1.5)), ("a", 1, None), ("b", 0, None)]);

        let mut buffer = Vec::new();
        Persister::write_to(&table, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "encounter,time_step,start_time,f,target_v,start,end,offset_from_intubation_start,offset_from_extubation"
        );
        assert_eq!(
            lines[1],
            "a,0,2024-01-15 00:00:00,0.25,1.5,2024-01-15 00:00:00,2024-01-15 10:00:00,0,-10"
        );
        assert!(lines[2].starts_with("a,1,"));
        assert!(lines[3].starts_with("b,0,"));
        assert_eq!(lines[3].split(',').nth(4), Some(""));
    }

    #[test]
    fn test_feature_column_colliding_with_output_is_rejected() {
        for name in ["start", "offset_from_extubation", "target_v", "encounter"] {
            let table = make_table(name, &[("a", 0, None)]);
            let err = Persister::write_to(&table, Vec::new()).unwrap_err();
            assert!(
                matches!(err, LabelError::ColumnConflict { ref column, .. } if column == name),
                "column {}",
                name
            );
        }
    }

    #[test]
    fn test_failed_write_removes_staging_file() {
        let root = std::env::temp_dir().join("extubation_labels_io_staging");
        let _ = std::fs::remove_dir_all(&root);
        // A non-empty directory at the target path makes the final rename fail
        let target = root.join("labels.csv");
        std::fs::create_dir_all(target.join("occupied")).unwrap();

        let table = make_table("f", &[("a", 0, Some(1.5))]);
        assert!(Persister::new(&target).write(&table).is_err());

        assert!(!root.join("labels.csv.partial").exists());
        assert!(target.join("occupied").is_dir());
    }
}
