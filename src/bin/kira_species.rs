use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_species::api::{SpeciesClient, SpeciesHttpClient};
use kira_species::config::{ConfigLoader, ResolvedConfig};
use kira_species::coordinator::{SyncCoordinator, SyncState};
use kira_species::domain::SpeciesPage;
use kira_species::error::{FetchError, SpeciesError};
use kira_species::output::{ClearResult, OutputMode, Printer, SyncSummary};
use kira_species::search::SearchMode;
use kira_species::store::{JsonFileStore, SpeciesStore};

#[derive(Parser)]
#[command(name = "kira-species")]
#[command(about = "Sync, cache and search a remote wildlife species catalogue")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch pages from the remote catalogue into the local cache")]
    Sync(SyncArgs),
    #[command(about = "List cached species, optionally filtered")]
    List(ListArgs),
    #[command(about = "Show one cached species")]
    Info(InfoArgs),
    #[command(about = "Remove every cached species")]
    Clear,
}

#[derive(Args)]
struct SyncArgs {
    /// Stop after this many page requests.
    #[arg(long)]
    pages: Option<u32>,

    /// Start again from page 1 instead of resuming.
    #[arg(long)]
    refresh: bool,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long)]
    search: Option<String>,

    #[arg(long, value_enum, default_value_t = SearchMode::Names)]
    mode: SearchMode,
}

#[derive(Args)]
struct InfoArgs {
    id: i64,
}

/// Stand-in client for commands that only read the local cache.
struct OfflineClient;

impl SpeciesClient for OfflineClient {
    fn fetch_page(&self, _page: u32, _per_page: u32) -> Result<SpeciesPage, FetchError> {
        Err(FetchError::Network("offline".to_string()))
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(err) = report.downcast_ref::<SpeciesError>() {
                return ExitCode::from(map_exit_code(err));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &SpeciesError) -> u8 {
    match error {
        SpeciesError::SpeciesNotFound(_)
        | SpeciesError::ConfigRead(_)
        | SpeciesError::ConfigParse(_)
        | SpeciesError::InvalidConfig(_) => 2,
        SpeciesError::Fetch(_) | SpeciesError::HttpClient(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let printer = Printer::new(if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    });
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let store = JsonFileStore::open(config.store_path.clone()).map_err(SpeciesError::from)?;

    match cli.command {
        Commands::Sync(args) => run_sync(args, &config, store, &printer),
        Commands::List(args) => run_list(args, &config, store, &printer),
        Commands::Info(args) => run_info(args, store, &printer),
        Commands::Clear => run_clear(store, &printer),
    }
}

fn run_sync(
    args: SyncArgs,
    config: &ResolvedConfig,
    store: JsonFileStore,
    printer: &Printer,
) -> miette::Result<ExitCode> {
    let client = SpeciesHttpClient::new(&config.base_url, config.timeout)?;
    let mut coordinator =
        SyncCoordinator::new(client, store, config.coordinator_options(SearchMode::Names));
    let limit = args.pages.unwrap_or(u32::MAX);
    let mut requested = 0u32;

    if args.refresh && limit > 0 {
        coordinator.refresh();
        requested += 1;
    }
    while requested < limit && coordinator.state() != SyncState::Errored {
        if !coordinator.load_next_page() {
            break;
        }
        requested += 1;
    }

    let snapshot = coordinator.snapshot();
    printer
        .print_sync(&SyncSummary::from_snapshot(&snapshot, requested))
        .into_diagnostic()?;
    if snapshot.state == SyncState::Errored {
        return Ok(ExitCode::from(3));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_list(
    args: ListArgs,
    config: &ResolvedConfig,
    store: JsonFileStore,
    printer: &Printer,
) -> miette::Result<ExitCode> {
    let mut coordinator =
        SyncCoordinator::new(OfflineClient, store, config.coordinator_options(args.mode));
    if let Some(text) = args.search {
        coordinator.set_search_text(text);
        coordinator.flush_search();
    }
    printer
        .print_species(coordinator.filtered_species())
        .into_diagnostic()?;
    Ok(ExitCode::SUCCESS)
}

fn run_info(args: InfoArgs, store: JsonFileStore, printer: &Printer) -> miette::Result<ExitCode> {
    let record = store
        .get(args.id)
        .ok_or(SpeciesError::SpeciesNotFound(args.id))?;
    printer.print_record(&record).into_diagnostic()?;
    Ok(ExitCode::SUCCESS)
}

fn run_clear(mut store: JsonFileStore, printer: &Printer) -> miette::Result<ExitCode> {
    let cleared = store.len();
    store.clear().map_err(SpeciesError::from)?;
    printer
        .print_clear(&ClearResult { cleared })
        .into_diagnostic()?;
    Ok(ExitCode::SUCCESS)
}
