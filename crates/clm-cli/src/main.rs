use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

/// Env var naming the default data directory (state, history, run lock).
const ENV_DATA_DIR: &str = "CLM_DATA_DIR";
const DEFAULT_DATA_DIR: &str = "data";

#[derive(Parser)]
#[command(name = "clm")]
#[command(about = "Classroom market daily price engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daily price update for one date
    Update {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<PathBuf>,

        /// Daily activity input (JSON)
        #[arg(long)]
        input: PathBuf,

        /// Directory holding state.json and history.json
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Compute and print without locking or writing anything
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Print the full run report as JSON instead of key=value lines
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Largest day-over-day moves from history
    Movers {
        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[arg(long, default_value_t = 5)]
        top: usize,
    },

    /// Current quote for every configured instrument
    Quotes {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    let res = match cli.cmd {
        Commands::Update {
            config_paths,
            input,
            data_dir,
            dry_run,
            json,
        } => commands::update::run_update(
            config_paths,
            input,
            resolve_data_dir(data_dir),
            dry_run,
            json,
        ),
        Commands::ConfigHash { paths } => commands::report::config_hash(&paths),
        Commands::Movers { data_dir, top } => commands::report::movers(resolve_data_dir(data_dir), top),
        Commands::Quotes {
            config_paths,
            data_dir,
        } => commands::report::quotes(&config_paths, resolve_data_dir(data_dir)),
    };

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(commands::exit_code(&e))
        }
    }
}

/// Logs go to stderr so stdout stays `key=value` only.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var_os(ENV_DATA_DIR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}
