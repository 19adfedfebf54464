//! extubate - Command-line interface for extubation label extraction
//!
//! Commands:
//! - run: Extract, mask and persist labels for one dataset split
//! - doctor: Check configuration and input availability
//! - schema: Print the input and output column contracts

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

use extubation_labels::config::{Dataset, RunConfig};
use extubation_labels::io::{
    ENCOUNTER_COLUMN, EVENT_END_COLUMN, EVENT_ENCOUNTER_COLUMN, EVENT_START_COLUMN,
    EVENT_SUCCESS_COLUMN, OBSERVED_AT_COLUMN, OUTPUT_TRAILING_COLUMNS, STATS_MEAN_COLUMN,
    STATS_NAME_COLUMN, STATS_STD_COLUMN, TIME_STEP_COLUMN,
};
use extubation_labels::{LabelError, LabelPipeline, CRATE_VERSION};

/// extubate - Leakage-safe extubation-pass labels for ICU time series
#[derive(Parser)]
#[command(name = "extubate")]
#[command(version = CRATE_VERSION)]
#[command(about = "Attach masked extubation-pass targets to per-timestep features", long_about = None)]
struct Cli {
    /// Increase log detail (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ConfigArgs {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dataset split to process
    #[arg(long, value_enum)]
    dataset: Option<Split>,

    /// Minimum hours on the ventilator (strictly greater than)
    #[arg(long)]
    min_int_obs: Option<f64>,

    /// Hours before extubation excluded from aggregation
    #[arg(long)]
    exclusion_win: Option<f64>,

    /// Pre-extubation aggregation window in hours
    #[arg(long)]
    extubation_win: Option<f64>,

    /// Ventilation events CSV
    #[arg(long)]
    events: Option<PathBuf>,

    /// Directory holding {split}Patients.csv
    #[arg(long)]
    raw_dir: Option<PathBuf>,

    /// Directory holding {split}Patients_zmuv_zffill.csv
    #[arg(long)]
    preprocessed_dir: Option<PathBuf>,

    /// Normalization statistics CSV
    #[arg(long)]
    zmuv: Option<PathBuf>,

    /// Output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract labels and write the labeled table
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Write the cohort audit as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Check configuration and input availability
    Doctor {
        #[command(flatten)]
        config: ConfigArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print column contracts
    Schema {
        /// Schema to print
        #[arg(value_enum)]
        schema_type: SchemaType,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Split {
    Train,
    Valid,
    Test,
}

impl From<Split> for Dataset {
    fn from(split: Split) -> Self {
        match split {
            Split::Train => Dataset::Train,
            Split::Valid => Dataset::Valid,
            Split::Test => Dataset::Test,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// The four input tables
    Input,
    /// The labeled output table
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), ExtubateCliError> {
    match cli.command {
        Commands::Run { config, report } => cmd_run(resolve_config(config)?, report),
        Commands::Doctor { config, json } => cmd_doctor(resolve_config(config)?, json),
        Commands::Schema { schema_type } => cmd_schema(schema_type),
    }
}

/// Start from the config file (or defaults) and apply flag overrides
fn resolve_config(args: ConfigArgs) -> Result<RunConfig, ExtubateCliError> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };

    let labels = &mut config.labels;
    if let Some(split) = args.dataset {
        labels.dataset = split.into();
    }
    if let Some(v) = args.min_int_obs {
        labels.min_int_obs_hours = v;
    }
    if let Some(v) = args.exclusion_win {
        labels.exclusion_win_hours = v;
    }
    if let Some(v) = args.extubation_win {
        labels.extubation_win_hours = v;
    }

    let paths = &mut config.paths;
    if let Some(p) = args.events {
        paths.events = p;
    }
    if let Some(p) = args.raw_dir {
        paths.raw_dir = p;
    }
    if let Some(p) = args.preprocessed_dir {
        paths.preprocessed_dir = p;
    }
    if let Some(p) = args.zmuv {
        paths.normalization_stats = p;
    }
    if let Some(p) = args.output_dir {
        paths.output_dir = p;
    }

    Ok(config)
}

fn cmd_run(config: RunConfig, report: Option<PathBuf>) -> Result<(), ExtubateCliError> {
    tracing::info!(
        dataset = config.labels.dataset.as_str(),
        min_int_obs = config.labels.min_int_obs_hours,
        exclusion_win = config.labels.exclusion_win_hours,
        extubation_win = config.labels.extubation_win_hours,
        "starting label extraction"
    );

    let pipeline = LabelPipeline::new(config);
    let summary = pipeline.run()?;

    if let Some(report_path) = report {
        fs::write(&report_path, summary.audit.to_json()?)?;
        tracing::info!(path = %report_path.display(), "wrote cohort audit");
    }

    println!("{}", summary.output_path.display());

    if summary.audit.labeled_encounters == 0 {
        return Err(ExtubateCliError::EmptyCohort);
    }

    Ok(())
}

fn cmd_doctor(config: RunConfig, json: bool) -> Result<(), ExtubateCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("extubation-labels {}", CRATE_VERSION),
    });

    checks.push(match config.labels.validate() {
        Ok(()) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "split={} min_int_obs={}h exclusion_win={}h extubation_win={}h vitals={}",
                config.labels.dataset.as_str(),
                config.labels.min_int_obs_hours,
                config.labels.exclusion_win_hours,
                config.labels.extubation_win_hours,
                config.labels.vitals.len()
            ),
        },
        Err(e) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    let dataset = config.labels.dataset;
    let inputs = [
        ("events", config.paths.events.clone()),
        ("raw_series", config.paths.raw_series(dataset)),
        ("preprocessed_series", config.paths.preprocessed_series(dataset)),
        ("normalization_stats", config.paths.normalization_stats.clone()),
    ];
    for (name, path) in inputs {
        checks.push(if path.is_file() {
            DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Ok,
                message: path.display().to_string(),
            }
        } else {
            DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Error,
                message: format!("{} does not exist", path.display()),
            }
        });
    }

    let output = config.paths.output(&config.labels);
    checks.push(DoctorCheck {
        name: "output".to_string(),
        status: if output.exists() {
            CheckStatus::Warning
        } else {
            CheckStatus::Ok
        },
        message: if output.exists() {
            format!("{} exists and will be overwritten", output.display())
        } else {
            output.display().to_string()
        },
    });

    let report = DoctorReport {
        version: CRATE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("extubate Doctor Report");
        println!("======================");
        println!("Version: {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(ExtubateCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType) -> Result<(), ExtubateCliError> {
    match schema_type {
        SchemaType::Input => {
            println!("Input A - ventilation events (CSV)");
            println!(
                "  {}, {}, {}, {}",
                EVENT_ENCOUNTER_COLUMN, EVENT_START_COLUMN, EVENT_END_COLUMN, EVENT_SUCCESS_COLUMN
            );
            println!("  First row per encounter is used; only successful episodes proceed.");
            println!();
            println!("Input B - raw time series: <raw_dir>/<split>Patients.csv");
            println!(
                "  {}, {}, {}, <one column per configured vital>",
                ENCOUNTER_COLUMN, TIME_STEP_COLUMN, OBSERVED_AT_COLUMN
            );
            println!();
            println!("Input C - preprocessed series: <preprocessed_dir>/<split>Patients_zmuv_zffill.csv");
            println!(
                "  {}, {}, {}, <numeric feature columns>",
                ENCOUNTER_COLUMN, TIME_STEP_COLUMN, OBSERVED_AT_COLUMN
            );
            println!();
            println!("Input D - normalization statistics (CSV)");
            println!(
                "  {}, {}, {}",
                STATS_NAME_COLUMN, STATS_MEAN_COLUMN, STATS_STD_COLUMN
            );
        }
        SchemaType::Output => {
            println!("Output - labeled table (CSV), sorted by (encounter, time_step)");
            println!(
                "  {}, {}, {}, <feature columns>, target_<vital>..., {}",
                ENCOUNTER_COLUMN,
                TIME_STEP_COLUMN,
                OBSERVED_AT_COLUMN,
                OUTPUT_TRAILING_COLUMNS.join(", ")
            );
            println!();
            println!("Targets are empty where offset_from_intubation_start < 0");
            println!("or offset_from_extubation > -extubation_win.");
        }
    }

    Ok(())
}

// Error types

#[derive(Debug)]
enum ExtubateCliError {
    Io(io::Error),
    Label(LabelError),
    Json(serde_json::Error),
    EmptyCohort,
    DoctorFailed,
}

impl From<io::Error> for ExtubateCliError {
    fn from(e: io::Error) -> Self {
        ExtubateCliError::Io(e)
    }
}

impl From<LabelError> for ExtubateCliError {
    fn from(e: LabelError) -> Self {
        ExtubateCliError::Label(e)
    }
}

impl From<serde_json::Error> for ExtubateCliError {
    fn from(e: serde_json::Error) -> Self {
        ExtubateCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ExtubateCliError> for CliError {
    fn from(e: ExtubateCliError) -> Self {
        match e {
            ExtubateCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ExtubateCliError::Label(e) => {
                let (code, hint) = match &e {
                    LabelError::MissingColumn { .. } => {
                        ("MISSING_COLUMN", "Run 'extubate schema input' for the expected columns")
                    }
                    LabelError::ColumnConflict { .. } => {
                        ("COLUMN_CONFLICT", "Rename the feature column in the preprocessed table")
                    }
                    LabelError::Configuration(_) => {
                        ("CONFIG_ERROR", "Run 'extubate doctor' to check the configuration")
                    }
                    LabelError::TimeParse(_) => {
                        ("TIME_PARSE_ERROR", "Check episode and observation timestamps")
                    }
                    LabelError::InvalidValue(_) | LabelError::Csv(_) => {
                        ("PARSE_ERROR", "Check input CSV contents")
                    }
                    LabelError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                    LabelError::Json(_) => ("JSON_ERROR", "Check configuration JSON syntax"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            ExtubateCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ExtubateCliError::EmptyCohort => CliError {
                code: "EMPTY_COHORT".to_string(),
                message: "No encounters survived labeling".to_string(),
                hint: Some("Inspect the --report audit for exclusion counts".to_string()),
            },
            ExtubateCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
