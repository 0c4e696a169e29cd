mod cmd;

use clap::{Parser, Subcommand};
use cmd::fixtures::FixturesSubcommand;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use wpdev_cli::env_file::{self, Bootstrap};
use wpdev_cli::root;
use wpdev_core::orchestrator::{UpRequest, DEFAULT_TEST_EXCLUDE_GROUP};
use wpdev_core::WpdevError;

#[derive(Parser)]
#[command(
    name = "wpdev",
    about = "Local WordPress environments for developing and testing the Organic plugin",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from docker-compose.yml)
    #[arg(long, global = true, env = "WPDEV_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start WordPress services and provision any that are not installed yet
    Up {
        /// WordPress services to start (default: wp61-php74)
        services: Vec<String>,

        /// Rebuild images and containers, reinstall dependencies
        #[arg(long)]
        build: bool,

        /// Drop the WordPress database and provision from scratch
        #[arg(long)]
        reset: bool,

        /// Install and activate the AMP plugin
        #[arg(long)]
        install_amp: bool,

        /// Pull plugin, ad, ads.txt and affiliate configs from the platform
        #[arg(long)]
        pull_configs: bool,
    },

    /// Stop all services
    Down {
        /// Also remove images, volumes and dependency caches
        #[arg(long)]
        nuke: bool,

        /// Do not ask before deleting dependency caches
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Restart services (default: all)
    Restart { services: Vec<String> },

    /// Run the plugin's PHPUnit suite
    RunTests {
        /// WordPress services to test in (default: wp61-php74)
        services: Vec<String>,

        /// PHPUnit groups to exclude
        #[arg(long = "exclude", value_name = "GROUP", default_value = DEFAULT_TEST_EXCLUDE_GROUP)]
        exclude: Vec<String>,
    },

    /// List WordPress services with their ports and databases
    Services,

    /// Manage the fixture dataset
    Fixtures {
        #[command(subcommand)]
        subcommand: FixturesSubcommand,
    },
}

impl Commands {
    /// Everything except the read-only listing needs a complete `.env`.
    fn needs_env_file(&self) -> bool {
        !matches!(self, Commands::Services)
    }
}

fn dispatch(root: &Path, command: Commands, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Up {
            services,
            build,
            reset,
            install_amp,
            pull_configs,
        } => cmd::up::run(
            root,
            UpRequest {
                services,
                build,
                reset,
                install_amp,
                pull_configs,
            },
            json,
        ),
        Commands::Down { nuke, yes } => cmd::down::run(root, nuke, yes, json),
        Commands::Restart { services } => cmd::restart::run(root, &services),
        Commands::RunTests { services, exclude } => cmd::run_tests::run(root, &services, &exclude),
        Commands::Services => cmd::services::run(root, json),
        Commands::Fixtures { subcommand } => cmd::fixtures::run(root, subcommand, json),
    }
}

/// `RUST_LOG`, when set and valid, replaces the per-command default level.
fn log_filter(rust_log: Option<&str>, default_level: tracing::Level) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::default().add_directive(default_level.into()))
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Up { .. }
        | Commands::Down { .. }
        | Commands::RunTests { .. }
        | Commands::Fixtures { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref(), default_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root_path = cli.root.as_deref();
    let root = root::resolve_root(root_path);

    let result = if cli.command.needs_env_file() {
        env_file::ensure(&root, &mut std::io::stdin().lock()).and_then(|state| match state {
            Bootstrap::Created => Ok(()),
            Bootstrap::Present => {
                env_file::load(&root).and_then(|()| dispatch(&root, cli.command, cli.json))
            }
        })
    } else {
        env_file::load_if_present(&root).and_then(|()| dispatch(&root, cli.command, cli.json))
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        let code = e
            .chain()
            .find_map(|cause| cause.downcast_ref::<WpdevError>())
            .map_or(1, WpdevError::exit_code);
        std::process::exit(code);
    }
}
