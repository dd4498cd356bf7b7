//! simout CLI - Command-line interface for simout-metrics
//!
//! Commands:
//! - run: Process the whole cohort from the master roster
//! - trial: Compute metrics for one recording
//! - list: List recordings in the trial folder, grouped by subject
//! - validate: Check the master roster for missing or duplicate entries
//! - doctor: Diagnose folder layout and configuration
//! - schema: Print column schemas

use clap::{Parser, Subcommand, ValueEnum};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use simout_metrics::schema::{
    ColumnSchema, Field, ProcessedSchema, ResultSchema, RosterSchema, SimoutSchema,
};
use simout_metrics::trial::group_by_subject;
use simout_metrics::{
    validate_roster, Config, DataManager, MetricCalculator, NominalSpeed, PipelineError,
    RosterLoadError, RosterReader, TracingLog, TrialFileName, TrialLoadError, TrialProcessor,
    PRODUCER_NAME, VERSION,
};

/// simout - Trial metrics and cohort summaries for driving-simulator logs
#[derive(Parser)]
#[command(name = "simout")]
#[command(version = VERSION)]
#[command(about = "Compute per-trial metrics from driving-simulator recordings", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Experiment folder; overrides paths.base_dir
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every subject in the master roster
    Run {
        /// Write the run report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute metrics for a single recording
    Trial {
        /// Recording file name inside the trial folder
        #[arg(short, long)]
        file: String,

        /// Nominal speed of the recording (60, 50 or 40); taken from the
        /// file name when omitted
        #[arg(long)]
        nominal: Option<NominalSpeed>,

        /// Course condition tag; taken from the file name when omitted
        #[arg(long)]
        condition: Option<String>,

        /// Keep samples with time >= start
        #[arg(long)]
        start: Option<f64>,

        /// Keep samples with time <= end
        #[arg(long)]
        end: Option<f64>,

        /// Export the processed series as CSV
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// List recordings in the trial folder, grouped by subject
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the master roster for missing or duplicate entries
    Validate {
        /// Output validation report as JSON
        #[arg(long)]
        json: bool,

        /// Fail when any warning is found
        #[arg(long)]
        strict: bool,
    },

    /// Diagnose folder layout and configuration
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print column schemas
    Schema {
        /// Schema to print
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Raw simulator output columns
    Simout,
    /// Derived per-sample columns
    Processed,
    /// Subject and cohort result columns
    Result,
    /// Master roster columns
    Roster,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            let body = serde_json::to_string(&CliError::from(e))
                .unwrap_or_else(|_| "Unknown error".to_string());
            eprintln!("{}", body);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), SimoutCliError> {
    let config = load_config(cli.config.as_deref(), cli.base_dir)?;

    // Schema output needs no logging or folders
    if let Commands::Schema { schema_type, json } = &cli.command {
        return cmd_schema(schema_type.clone(), *json);
    }

    let log_file = init_logging(&config, matches!(cli.command, Commands::Run { .. }))?;
    if let Some(path) = &log_file {
        tracing::info!("Logging to '{}'", path.display());
    }

    match cli.command {
        Commands::Run { report, json } => cmd_run(&config, report.as_deref(), json),

        Commands::Trial {
            file,
            nominal,
            condition,
            start,
            end,
            export,
        } => cmd_trial(&config, &file, nominal, condition, start, end, export.as_deref()),

        Commands::List { json } => cmd_list(&config, json),

        Commands::Validate { json, strict } => cmd_validate(&config, json, strict),

        Commands::Doctor { json } => cmd_doctor(&config, cli.config.as_deref(), json),

        Commands::Schema { schema_type, json } => cmd_schema(schema_type, json),
    }
}

fn load_config(path: Option<&Path>, base_dir: Option<PathBuf>) -> Result<Config, SimoutCliError> {
    let mut config = match path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(base_dir) = base_dir {
        config.paths.base_dir = base_dir;
    }
    Ok(config)
}

/// Console logging on stderr, plus a timestamped file under the log folder
/// for cohort runs when `logging.to_file` is set. `RUST_LOG` overrides the
/// configured level.
fn init_logging(config: &Config, with_file: bool) -> Result<Option<PathBuf>, SimoutCliError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let mut log_path = None;
    let file_layer = if with_file && config.logging.to_file {
        fs::create_dir_all(config.paths.log_dir_path())?;
        let name = format!("{}.txt", chrono::Local::now().format("%Y%m%d_%H%M%S"));
        let path = config.paths.log_path(&name);
        let file = File::create(&path)?;
        log_path = Some(path);
        Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
    } else {
        None
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .try_init();

    Ok(log_path)
}

fn cmd_run(config: &Config, report_path: Option<&Path>, json: bool) -> Result<(), SimoutCliError> {
    let log = TracingLog;
    let report = DataManager::new(config, &log).run()?;

    if let Some(path) = report_path {
        fs::write(path, report.to_json()?)?;
    }

    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("Run Report");
        println!("==========");
        println!("Run id:             {}", report.run_id);
        println!("Subjects processed: {}", report.subjects_processed);
        println!("Subjects skipped:   {}", report.subjects_skipped);
        println!("Subjects failed:    {}", report.failures.len());
        println!("Rows:               {}", report.rows);
        if let Some(path) = &report.cohort_path {
            println!("Cohort file:        {}", path.display());
        }

        if !report.warnings.is_empty() {
            println!("\nWarnings:");
            for warning in &report.warnings {
                println!("  - {}", warning);
            }
        }
        if !report.failures.is_empty() {
            println!("\nFailures:");
            for failure in &report.failures {
                println!("  - Subject {}: {}", failure.subject_id, failure.error);
            }
        }
    }

    Ok(())
}

fn cmd_trial(
    config: &Config,
    file: &str,
    nominal: Option<NominalSpeed>,
    condition: Option<String>,
    start: Option<f64>,
    end: Option<f64>,
    export: Option<&Path>,
) -> Result<(), SimoutCliError> {
    let log = TracingLog;
    let calculator = MetricCalculator::new();

    let parsed = TrialFileName::parse(file);
    let nominal = nominal
        .or_else(|| parsed.as_ref().and_then(|p| p.nominal()))
        .unwrap_or(NominalSpeed::Kmh60);
    let condition = condition.or_else(|| parsed.map(|p| p.condition));

    let mut trial = TrialProcessor::new(
        config,
        &calculator,
        Some(file),
        nominal,
        condition.clone(),
        &log,
    )?;

    if start.is_some() || end.is_some() {
        let start = start.unwrap_or(f64::NEG_INFINITY);
        let end = end.unwrap_or(f64::INFINITY);
        if start > end {
            return Err(SimoutCliError::InvalidArgument(format!(
                "--start {} is after --end {}",
                start, end
            )));
        }
        let window = calculator.filter_time_range(trial.series(), start, end);
        let path = trial.path().to_path_buf();
        trial = TrialProcessor::from_series(
            &config.vehicle,
            &calculator,
            file,
            &path,
            window,
            nominal,
            condition,
            &log,
        )?;
    }

    let summary = trial.process();

    if let Some(path) = export {
        trial.series().export(path)?;
        tracing::info!("Exported {} samples to '{}'", trial.series().len(), path.display());
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_list(config: &Config, json: bool) -> Result<(), SimoutCliError> {
    let names = config.paths.simout_file_names()?;
    let (grouped, unmatched) = group_by_subject(names.as_slice());

    let report = ListReport {
        folder: config.paths.simout_dir_path(),
        subjects: grouped
            .iter()
            .map(|(subject_id, files)| ListedSubject {
                subject_id: subject_id.0,
                files: files
                    .iter()
                    .map(|f| ListedFile {
                        file_name: f.file_name.clone(),
                        recorded_speed: f.recorded_speed,
                        nominal: f.nominal().map(|n| n.kmh()),
                        condition: f.condition.clone(),
                    })
                    .collect(),
            })
            .collect(),
        unmatched,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Recordings in {}", report.folder.display());
        for subject in &report.subjects {
            println!("\nSubject {:02}:", subject.subject_id);
            for file in &subject.files {
                let nominal = file
                    .nominal
                    .map(|n| format!("{} km/h", n))
                    .unwrap_or_else(|| "unknown speed".to_string());
                println!("  - {} ({}, condition {})", file.file_name, nominal, file.condition);
            }
        }
        if !report.unmatched.is_empty() {
            println!("\nUnrecognized file names:");
            for name in &report.unmatched {
                println!("  - {}", name);
            }
        }
    }

    Ok(())
}

fn cmd_validate(config: &Config, json: bool, strict: bool) -> Result<(), SimoutCliError> {
    let log = TracingLog;
    let records = RosterReader::new(config.paths.roster_path(), &log).get_subjects()?;
    let warnings = validate_roster(&records);

    let report = ValidationReport {
        roster: config.paths.roster_path(),
        total_records: records.len(),
        warnings: warnings.iter().map(|w| w.to_string()).collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Roster Validation Report");
        println!("========================");
        println!("Roster:   {}", report.roster.display());
        println!("Records:  {}", report.total_records);
        println!("Warnings: {}", report.warnings.len());

        if !report.warnings.is_empty() {
            println!("\nWarnings:");
            for warning in &report.warnings {
                println!("  - {}", warning);
            }
        }
    }

    if strict && !warnings.is_empty() {
        Err(SimoutCliError::ValidationFailed(warnings.len()))
    } else {
        Ok(())
    }
}

fn cmd_doctor(
    config: &Config,
    config_path: Option<&Path>,
    json: bool,
) -> Result<(), SimoutCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} version {}", PRODUCER_NAME, VERSION),
    });

    checks.push(DoctorCheck {
        name: "config".to_string(),
        status: CheckStatus::Ok,
        message: match config_path {
            Some(path) => format!("Loaded {}", path.display()),
            None => "Using built-in defaults".to_string(),
        },
    });

    // Roster
    let log = TracingLog;
    let roster_path = config.paths.roster_path();
    checks.push(match RosterReader::new(&roster_path, &log).load() {
        Ok(table) => DoctorCheck {
            name: "roster".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "{}: {} records ({} without file_name_60)",
                roster_path.display(),
                table.records.len(),
                table.dropped
            ),
        },
        Err(e) => DoctorCheck {
            name: "roster".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    // Trial folder
    checks.push(match config.paths.simout_file_names() {
        Ok(names) if names.is_empty() => DoctorCheck {
            name: "simout_dir".to_string(),
            status: CheckStatus::Warning,
            message: format!("{} has no CSV recordings", config.paths.simout_dir_path().display()),
        },
        Ok(names) => DoctorCheck {
            name: "simout_dir".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "{}: {} CSV recordings",
                config.paths.simout_dir_path().display(),
                names.len()
            ),
        },
        Err(e) => DoctorCheck {
            name: "simout_dir".to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot read {}: {}", config.paths.simout_dir_path().display(), e),
        },
    });

    // Output folders are created on demand
    for (name, dir) in [
        ("output_dir", config.paths.output_dir_path()),
        ("subject_results_dir", config.paths.subject_results_dir_path()),
    ] {
        checks.push(if dir.is_dir() {
            DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Ok,
                message: format!("{} exists", dir.display()),
            }
        } else {
            DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Warning,
                message: format!("{} does not exist yet, it will be created", dir.display()),
            }
        });
    }

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("simout Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(SimoutCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json: bool) -> Result<(), SimoutCliError> {
    let (name, fields) = match schema_type {
        SchemaType::Simout => (SimoutSchema::NAME, SimoutSchema::FIELDS),
        SchemaType::Processed => (ProcessedSchema::NAME, ProcessedSchema::FIELDS),
        SchemaType::Result => (ResultSchema::NAME, ResultSchema::FIELDS),
        SchemaType::Roster => (RosterSchema::NAME, RosterSchema::FIELDS),
    };

    if json {
        let report = SchemaReport {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|f| SchemaField {
                    key: f.key.to_string(),
                    column: f.column.to_string(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Schema: {}", name);
        println!();
        print_fields(fields);
    }

    Ok(())
}

// Helper functions

fn print_fields(fields: &[Field]) {
    let width = fields.iter().map(|f| f.key.len()).max().unwrap_or(0);
    for field in fields {
        println!("  {:width$}  ->  {}", field.key, field.column, width = width);
    }
}

// Error types

#[derive(Debug)]
enum SimoutCliError {
    Io(io::Error),
    Json(serde_json::Error),
    Roster(RosterLoadError),
    Trial(TrialLoadError),
    Pipeline(PipelineError),
    ValidationFailed(usize),
    DoctorFailed,
    InvalidArgument(String),
}

impl std::fmt::Display for SimoutCliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimoutCliError::Io(e) => write!(f, "{}", e),
            SimoutCliError::Json(e) => write!(f, "{}", e),
            SimoutCliError::Roster(e) => write!(f, "{}", e),
            SimoutCliError::Trial(e) => write!(f, "{}", e),
            SimoutCliError::Pipeline(e) => write!(f, "{}", e),
            SimoutCliError::ValidationFailed(count) => write!(f, "{} roster warnings", count),
            SimoutCliError::DoctorFailed => write!(f, "One or more health checks failed"),
            SimoutCliError::InvalidArgument(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<io::Error> for SimoutCliError {
    fn from(e: io::Error) -> Self {
        SimoutCliError::Io(e)
    }
}

impl From<serde_json::Error> for SimoutCliError {
    fn from(e: serde_json::Error) -> Self {
        SimoutCliError::Json(e)
    }
}

impl From<RosterLoadError> for SimoutCliError {
    fn from(e: RosterLoadError) -> Self {
        SimoutCliError::Roster(e)
    }
}

impl From<TrialLoadError> for SimoutCliError {
    fn from(e: TrialLoadError) -> Self {
        SimoutCliError::Trial(e)
    }
}

impl From<PipelineError> for SimoutCliError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::RosterLoad(e) => SimoutCliError::Roster(e),
            PipelineError::TrialLoad(e) => SimoutCliError::Trial(e),
            other => SimoutCliError::Pipeline(other),
        }
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<SimoutCliError> for CliError {
    fn from(e: SimoutCliError) -> Self {
        match e {
            SimoutCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            SimoutCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            SimoutCliError::Roster(e) => CliError {
                code: "ROSTER_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'simout schema roster' for the expected columns".to_string()),
            },
            SimoutCliError::Trial(e) => CliError {
                code: "TRIAL_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'simout list' to see available recordings".to_string()),
            },
            SimoutCliError::Pipeline(PipelineError::Config(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Check the --config file".to_string()),
            },
            SimoutCliError::Pipeline(e) => CliError {
                code: "PIPELINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'simout doctor' for details".to_string()),
            },
            SimoutCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} roster warnings", count),
                hint: Some("Fix the roster entries and retry".to_string()),
            },
            SimoutCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            SimoutCliError::InvalidArgument(msg) => CliError {
                code: "INVALID_ARGUMENT".to_string(),
                message: msg,
                hint: None,
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    roster: PathBuf,
    total_records: usize,
    warnings: Vec<String>,
}

#[derive(serde::Serialize)]
struct ListReport {
    folder: PathBuf,
    subjects: Vec<ListedSubject>,
    unmatched: Vec<String>,
}

#[derive(serde::Serialize)]
struct ListedSubject {
    subject_id: u32,
    files: Vec<ListedFile>,
}

#[derive(serde::Serialize)]
struct ListedFile {
    file_name: String,
    recorded_speed: u32,
    nominal: Option<u32>,
    condition: String,
}

#[derive(serde::Serialize)]
struct SchemaReport {
    name: String,
    fields: Vec<SchemaField>,
}

#[derive(serde::Serialize)]
struct SchemaField {
    key: String,
    column: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
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
