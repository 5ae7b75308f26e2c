//! dr-duck: DuckDB helpers with a Hugging Face dataset cache.
//!
//! Opens DuckDB connections, registers credentials as engine secrets and runs
//! templated queries over local parquet files, S3 and the Hugging Face hub.
//! Hub datasets can be mirrored into a local cache so repeated queries do not
//! hit the network.
//!
//! # Modules
//!
//! - [`duck`]: connections, secrets, query helpers and the [`DataFrame`] result type
//! - [`hf`]: hub location resolution, cache layout, downloads and hub queries
//! - [`fsutil`]: glob matching over local directory trees
//! - [`render`]: table, CSV and JSON output strategies
//! - [`config`]: settings resolved from the environment
//! - [`error`]: the crate error type

pub mod config;
pub mod duck;
pub mod error;
pub mod fsutil;
pub mod hf;
pub mod render;

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub use duck::connection::{open_local, open_motherduck, ConnectionOptions};
pub use duck::frame::DataFrame;
pub use duck::Session;
pub use error::DrDuckError;
pub use hf::acquire::{cached_resources, download_location, HubClient};
pub use hf::cache::CachePathMapper;
pub use hf::resolve::resolve_location;
pub use hf::{query_hf_cached, query_hf_offline, query_hf_remote, HfLocation, HfRepoId, HfResource};
pub use render::{renderer_for, FrameRenderer, OutputFormat};

use config::Settings;

/// The dr-duck CLI application.
#[derive(Parser)]
#[command(name = "dr-duck")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// DuckDB database file (in-memory when omitted).
    #[arg(long, global = true, env = "DR_DUCK_DB", value_name = "FILE")]
    db: Option<PathBuf>,

    /// Connect to MotherDuck instead of a local database (ignores --db).
    #[arg(long, global = true)]
    motherduck: bool,

    /// Load environment variables from this file before reading credentials.
    #[arg(long, global = true, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// How query results are written to stdout.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run a SQL statement and print the result.
    Query(QueryArgs),

    /// Query a parquet file, glob or remote URL.
    Parquet(ParquetArgs),

    /// List tables in the database.
    Tables,

    /// Show the columns of a table.
    Describe(DescribeArgs),

    /// Hugging Face hub datasets.
    Hf {
        #[command(subcommand)]
        command: HfCommands,
    },
}

#[derive(Subcommand)]
enum HfCommands {
    /// Download matching files into the local cache and print their paths.
    Pull(HfLocationArgs),

    /// Query hub files directly through the engine without caching.
    Query(HfQueryArgs),

    /// Cache matching files, then query the local copies.
    Cached(HfCachedArgs),
}

#[derive(clap::Args)]
struct QueryArgs {
    /// SQL to execute.
    sql: String,
}

#[derive(clap::Args)]
struct ParquetArgs {
    /// Local path, glob, s3:// or hf:// URL.
    path: String,

    /// SQL template; `{table}` is replaced with the parquet source.
    #[arg(long)]
    sql: Option<String>,
}

#[derive(clap::Args)]
struct DescribeArgs {
    table: String,
}

/// Which hub files to use.
#[derive(clap::Args)]
struct HfLocationArgs {
    /// Repository id (`namespace/name`), hub URL or `hf://datasets/...` URL.
    repo: String,

    /// Path glob inside the repository [default: **/*.parquet].
    #[arg(long)]
    path: Option<String>,

    /// Branch, tag or commit [default: main].
    #[arg(long)]
    revision: Option<String>,

    /// Local cache root (overrides DR_DUCK_CACHE_DIR).
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// HTTP timeout for hub requests (overrides DR_DUCK_HTTP_TIMEOUT_SECS).
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,
}

#[derive(clap::Args)]
struct HfQueryArgs {
    #[command(flatten)]
    location: HfLocationArgs,

    /// SQL template; `{table}` is replaced with the hub files.
    #[arg(long)]
    sql: Option<String>,
}

#[derive(clap::Args)]
struct HfCachedArgs {
    #[command(flatten)]
    query: HfQueryArgs,

    /// Only read files already in the cache.
    #[arg(long)]
    offline: bool,
}

/// Run the dr-duck CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), DrDuckError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(path) = cli.env_file.as_deref() {
        config::load_env_file(path)?;
    }

    let Some(command) = cli.command else {
        println!("dr-duck {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("DuckDB helpers with a Hugging Face dataset cache.");
        println!();
        println!("Run 'dr-duck --help' for usage information.");
        return Ok(());
    };

    let settings = Settings::from_env()?;
    let renderer = renderer_for(cli.format);
    let ctx = CommandContext {
        db: cli.db,
        motherduck: cli.motherduck,
        settings,
        renderer,
    };

    match command {
        Commands::Query(args) => run_query(&ctx, args),
        Commands::Parquet(args) => run_parquet(&ctx, args),
        Commands::Tables => run_tables(&ctx),
        Commands::Describe(args) => run_describe(&ctx, args),
        Commands::Hf { command } => match command {
            HfCommands::Pull(args) => run_hf_pull(&ctx, args),
            HfCommands::Query(args) => run_hf_query(&ctx, args),
            HfCommands::Cached(args) => run_hf_cached(&ctx, args),
        },
    }
}

/// Everything a subcommand needs, resolved once.
struct CommandContext {
    db: Option<PathBuf>,
    motherduck: bool,
    settings: Settings,
    renderer: Box<dyn FrameRenderer>,
}

impl CommandContext {
    fn open_session(&self) -> Result<Session, DrDuckError> {
        let options = self.settings.connection_options(self.db.clone());
        if self.motherduck {
            open_motherduck(&options)
        } else {
            open_local(&options)
        }
    }

    fn emit(&self, frame: &DataFrame) -> Result<(), DrDuckError> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.renderer.render(frame, &mut out)?;
        out.flush()?;
        Ok(())
    }

    /// Settings with the per-command cache and timeout overrides applied.
    fn hub_settings(&self, args: &HfLocationArgs) -> Settings {
        let mut settings = self.settings.clone();
        if let Some(dir) = args.cache_dir.clone() {
            settings.cache_dir = Some(dir);
        }
        if let Some(secs) = args.timeout_secs {
            settings.http_timeout = Duration::from_secs(secs);
        }
        settings
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run_query(ctx: &CommandContext, args: QueryArgs) -> Result<(), DrDuckError> {
    let session = ctx.open_session()?;
    let frame = duck::query::query_to_df(&session, &args.sql)?;
    ctx.emit(&frame)
}

fn run_parquet(ctx: &CommandContext, args: ParquetArgs) -> Result<(), DrDuckError> {
    let session = ctx.open_session()?;
    let frame = duck::query::query_parquet(&session, &args.path, args.sql.as_deref())?;
    ctx.emit(&frame)
}

fn run_tables(ctx: &CommandContext) -> Result<(), DrDuckError> {
    let session = ctx.open_session()?;
    let frame = duck::query::list_tables(&session)?;
    ctx.emit(&frame)
}

fn run_describe(ctx: &CommandContext, args: DescribeArgs) -> Result<(), DrDuckError> {
    let session = ctx.open_session()?;
    let frame = duck::query::describe_table(&session, &args.table)?;
    ctx.emit(&frame)
}

fn resolve_args(args: &HfLocationArgs) -> Result<HfLocation, DrDuckError> {
    resolve_location(&args.repo, args.path.as_deref(), args.revision.as_deref())
}

fn run_hf_pull(ctx: &CommandContext, args: HfLocationArgs) -> Result<(), DrDuckError> {
    let location = resolve_args(&args)?;
    let settings = ctx.hub_settings(&args);
    let mapper = settings.cache_mapper()?;
    let client = hub_client(&settings)?;
    let resources = download_location(client.as_ref(), &mapper, &location)?;
    info!(
        location = %location,
        files = resources.len(),
        root = %mapper.root().display(),
        "pull complete"
    );
    ctx.emit(&hf::resources_frame(&resources)?)
}

fn run_hf_query(ctx: &CommandContext, args: HfQueryArgs) -> Result<(), DrDuckError> {
    let location = resolve_args(&args.location)?;
    let session = ctx.open_session()?;
    let frame = query_hf_remote(&session, &location, args.sql.as_deref())?;
    ctx.emit(&frame)
}

fn run_hf_cached(ctx: &CommandContext, args: HfCachedArgs) -> Result<(), DrDuckError> {
    let HfCachedArgs { query, offline } = args;
    let location = resolve_args(&query.location)?;
    let settings = ctx.hub_settings(&query.location);
    let mapper = settings.cache_mapper()?;
    let session = ctx.open_session()?;
    let sql = query.sql.as_deref();

    let frame = if offline {
        query_hf_offline(&session, &mapper, &location, sql)?
    } else {
        let client = hub_client(&settings)?;
        query_hf_cached(&session, client.as_ref(), &mapper, &location, sql)?
    };
    ctx.emit(&frame)
}

#[cfg(feature = "hf-remote")]
fn hub_client(settings: &Settings) -> Result<Box<dyn HubClient>, DrDuckError> {
    let client = hf::client::HfHubClient::new(&settings.client_options())?;
    Ok(Box::new(client))
}

#[cfg(not(feature = "hf-remote"))]
fn hub_client(_settings: &Settings) -> Result<Box<dyn HubClient>, DrDuckError> {
    Err(DrDuckError::Config(
        "hub downloads need the 'hf-remote' feature; use --offline to read the cache".to_string(),
    ))
}
