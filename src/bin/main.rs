//! cellsvm command line interface
//!
//! Runs the full train/select/test pipeline on CSV data for any of the
//! built-in learning scenarios, and prints per-stage configuration lines
//! for inspection.

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use serde::Serialize;
use std::path::PathBuf;
use std::process;

use cellsvm::api;
use cellsvm::config::{ConfigStore, Stage};
use cellsvm::core::{Result, ResultTable};
use cellsvm::data::load_csv;
use cellsvm::scenario::Scenario;

#[derive(Parser)]
#[command(name = "cellsvm")]
#[command(about = "A support vector machine engine with cell partitioning and grid selection")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train, select and test on CSV data
    Run(RunArgs),
    /// Print the effective per-stage configuration lines
    Config(ConfigArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Training data file (CSV, last column is the label)
    #[arg(long)]
    data: PathBuf,

    /// Test data file; training data is reused when omitted
    #[arg(long)]
    test_data: Option<PathBuf>,

    /// Learning scenario: LS, MC <type>, QT, EX, ROC, or NPL <class>
    #[arg(short, long, default_value = "LS")]
    scenario: String,

    /// Enable spatial cell partitioning
    #[arg(long)]
    use_cells: bool,

    /// Target rows per cell
    #[arg(long)]
    cell_size: Option<usize>,

    /// Worker threads (0 uses all cores)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Grid preset (-1 coarse, 0 default, 1 fine, 2 finest)
    #[arg(long)]
    grid_choice: Option<i64>,

    /// Quantile/expectile levels, comma separated
    #[arg(long)]
    weights: Option<String>,

    /// ROC weight steps
    #[arg(long)]
    weight_steps: Option<usize>,

    /// NPL constraint level
    #[arg(long)]
    npl_constraint: Option<f64>,

    /// Write the JSON run report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ConfigArgs {
    /// Parameters as NAME=VALUE pairs
    #[arg(long = "set", value_name = "NAME=VALUE")]
    sets: Vec<String>,
}

#[derive(Serialize)]
struct RunReport {
    created_at: String,
    scenario: String,
    train_rows: usize,
    features: usize,
    candidates: usize,
    selected: usize,
    test: Option<TestReport>,
}

#[derive(Serialize)]
struct TestReport {
    rows: usize,
    prediction_columns: usize,
    errors: Vec<TaskError>,
}

#[derive(Serialize)]
struct TaskError {
    task: f64,
    error: f64,
    positive_error: f64,
    negative_error: f64,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Config(args) => cmd_config(args),
    };

    if let Err(e) = result {
        error!("{e}");
        process::exit(1);
    }
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let scenario: Scenario = args.scenario.parse()?;

    info!("loading training data from {:?}", args.data);
    let train_data = load_csv(&args.data)?;
    info!(
        "{} rows, {} features",
        train_data.rows(),
        train_data.cols()
    );

    let handle = api::init(
        train_data.values(),
        train_data.rows(),
        train_data.cols(),
        train_data.labels().unwrap_or_default(),
    )?;
    api::set_param(handle, "SCENARIO", &args.scenario)?;
    if args.use_cells {
        api::set_param(handle, "USECELLS", "1")?;
    }
    if let Some(cell_size) = args.cell_size {
        api::set_param(handle, "CELL_SIZE", &cell_size.to_string())?;
    }
    if let Some(threads) = args.threads {
        api::set_param(handle, "THREADS", &threads.to_string())?;
    }
    if let Some(grid_choice) = args.grid_choice {
        api::set_param(handle, "GRID_CHOICE", &grid_choice.to_string())?;
    }
    if let Some(weights) = &args.weights {
        api::set_param(handle, "WEIGHTS", &weights.replace(',', " "))?;
    }
    if let Some(steps) = args.weight_steps {
        api::set_param(handle, "WEIGHT_STEPS", &steps.to_string())?;
    }

    let argv = vec!["cellsvm".to_string()];

    info!("training");
    let train_table = api::train(handle, &argv)?;
    info!("{} candidates trained", train_table.rows());

    let selected = run_selects(handle, scenario, &args, &argv)?;
    info!("{selected} model(s) selected");

    let test_report = {
        let test_data = match &args.test_data {
            Some(path) => {
                info!("loading test data from {path:?}");
                load_csv(path)?
            }
            None => train_data.clone(),
        };
        let (predictions, errors) = api::test(
            handle,
            &argv,
            test_data.values(),
            test_data.rows(),
            test_data.cols(),
            test_data.labels(),
        )?;
        Some(TestReport {
            rows: predictions.rows(),
            prediction_columns: predictions.cols(),
            errors: error_rows(&errors),
        })
    };

    let report = RunReport {
        created_at: chrono::Utc::now().to_rfc3339(),
        scenario: scenario.to_string(),
        train_rows: train_data.rows(),
        features: train_data.cols(),
        candidates: train_table.rows(),
        selected,
        test: test_report,
    };

    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| cellsvm::SvmError::ParseError(e.to_string()))?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!("report written to {path:?}");
        }
        None => println!("{json}"),
    }

    api::clean(handle);
    Ok(())
}

/// One select pass per sweep value, the way each scenario calls for.
fn run_selects(
    handle: i32,
    scenario: Scenario,
    args: &RunArgs,
    argv: &[String],
) -> Result<usize> {
    let mut selected = 0;
    match scenario {
        Scenario::LeastSquares | Scenario::MultiClass(_) => {
            selected += api::select(handle, argv)?.rows();
        }
        Scenario::Quantile | Scenario::Expectile => {
            let levels = match &args.weights {
                Some(w) => w.split(',').count(),
                None => Scenario::DEFAULT_LEVELS.len(),
            };
            for i in 1..=levels {
                api::set_param(handle, "WEIGHT_NUMBER", &i.to_string())?;
                selected += api::select(handle, argv)?.rows();
            }
        }
        Scenario::Roc => {
            let steps = args.weight_steps.unwrap_or(9);
            for i in 1..=steps {
                api::set_param(handle, "WEIGHT_NUMBER", &i.to_string())?;
                selected += api::select(handle, argv)?.rows();
            }
        }
        Scenario::Npl { class } => {
            let constraint = args.npl_constraint.unwrap_or(0.05);
            for factor in [0.5, 2.0 / 3.0, 1.0, 1.5, 2.0] {
                api::set_param(handle, "NPL_CLASS", &class.to_string())?;
                api::set_param(handle, "NPL_CONSTRAINT", &(constraint * factor).to_string())?;
                selected += api::select(handle, argv)?.rows();
            }
        }
    }
    Ok(selected)
}

fn error_rows(errors: &ResultTable) -> Vec<TaskError> {
    (0..errors.rows())
        .map(|r| TaskError {
            task: errors.get(r, 0),
            error: errors.get(r, 1),
            positive_error: errors.get(r, 2),
            negative_error: errors.get(r, 3),
        })
        .collect()
}

fn cmd_config(args: ConfigArgs) -> Result<()> {
    let mut config = ConfigStore::new();
    for pair in &args.sets {
        let (name, value) = pair.split_once('=').ok_or_else(|| {
            cellsvm::SvmError::InvalidParameter(format!("expected NAME=VALUE, got '{pair}'"))
        })?;
        config.set(name, value)?;
    }
    for stage in [Stage::Train, Stage::Select, Stage::Test] {
        println!("{}", config.config_line(stage));
    }
    Ok(())
}
