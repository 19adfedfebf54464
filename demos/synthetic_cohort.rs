//! Run the labeling pipeline over a small synthetic cohort and print the audit

use chrono::{NaiveDate, TimeDelta};
use extubation_labels::io::Persister;
use extubation_labels::types::TimestepRow;
use extubation_labels::{extract_labels, LabelConfig, LabelInputs, NormalizationStats, TimestepTable, VentilationEvent};

fn main() {
    let t0 = NaiveDate::from_ymd_opt(2024, 1, 15)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid date");
    let fmt = |h: i64| (t0 + TimeDelta::hours(h)).format("%Y-%m-%d %H:%M:%S").to_string();

    let events = vec![
        VentilationEvent { encounter: "pass".into(), start: fmt(0), end: fmt(20), success: true },
        VentilationEvent { encounter: "short".into(), start: fmt(0), end: fmt(12), success: true },
        VentilationEvent { encounter: "fail".into(), start: fmt(0), end: fmt(20), success: false },
    ];

    let series = |encounter: &str, last_hour: i64| -> Vec<TimestepRow> {
        (-2..=last_hour)
            .map(|h| TimestepRow {
                encounter: encounter.to_string(),
                time_step: h + 2,
                observed_at: t0 + TimeDelta::hours(h),
                values: vec![Some(70.0 + h as f64), Some(16.0 + (h % 3) as f64)],
            })
            .collect()
    };
    let rows: Vec<TimestepRow> = ["pass", "short", "fail"]
        .iter()
        .zip([20, 12, 20])
        .flat_map(|(encounter, last)| series(*encounter, last))
        .collect();
    let columns = vec!["Heart Rate".to_string(), "Respiratory Rate".to_string()];

    let stats: NormalizationStats = [("Heart Rate", 85.0, 15.0), ("Respiratory Rate", 18.0, 5.0)]
        .into_iter()
        .collect();

    let inputs = LabelInputs {
        events,
        raw: TimestepTable { columns: columns.clone(), rows: rows.clone() },
        preprocessed: TimestepTable { columns, rows },
        stats,
    };
    let config = LabelConfig {
        vitals: vec!["Heart Rate".to_string(), "Respiratory Rate".to_string()],
        ..Default::default()
    };

    match extract_labels(inputs, &config) {
        Ok(output) => {
            if let Ok(audit) = output.audit.to_json() {
                eprintln!("{audit}");
            }
            if let Err(e) = Persister::write_to(&output.table, std::io::stdout()) {
                eprintln!("Error: {e:?}");
            }
        }
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
