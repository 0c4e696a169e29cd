use std::path::{Path, PathBuf};

use clap::Subcommand;
use wpdev_cli::output::print_json;
use wpdev_core::config::{ConfigLoader, EnvironmentConfig};
use wpdev_core::fixtures::{self, DEFAULT_ORIGIN_PORT, FIXTURES_SERVICE};
use wpdev_core::orchestrator::ServiceGroup;
use wpdev_core::paths;
use wpdev_core::runner::DockerCompose;
use wpdev_core::secrets::ProcessEnv;
use wpdev_core::wp;

#[derive(Subcommand)]
pub enum FixturesSubcommand {
    /// Reset the fixtures site and install FakerPress for generating content
    Setup,
    /// Clean volatile rows and dump the fixtures database to the host
    Save {
        /// Output file (default: fixtures/wpdb.sql under the project root)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Replace a WordPress service's database with the saved dump
    Load {
        /// WordPress service to load into
        service: String,
        /// Dump to import (default: fixtures/wpdb.sql under the project root)
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,
    },
}

/// Port the dump's URLs were written with: the fixtures service's port.
fn origin_port(config: &EnvironmentConfig) -> anyhow::Result<u16> {
    if config.contains(FIXTURES_SERVICE) {
        Ok(config.port_of(FIXTURES_SERVICE, &ProcessEnv)?)
    } else {
        Ok(DEFAULT_ORIGIN_PORT)
    }
}

pub fn run(root: &Path, subcmd: FixturesSubcommand, json: bool) -> anyhow::Result<()> {
    let loader = ConfigLoader::new(root);
    let config = super::load_config(&loader)?;
    let runner = DockerCompose::new(root);

    match subcmd {
        FixturesSubcommand::Setup => {
            let service = config.descriptor(FIXTURES_SERVICE, &ProcessEnv)?;
            fixtures::setup(&runner, &service)?;
            if json {
                print_json(&serde_json::json!({
                    "service": service.name,
                    "admin_url": wp::admin_url(service.port),
                }))?;
            } else {
                println!(
                    "Fixtures site ready at {} (user: {}, pass: {})",
                    wp::admin_url(service.port),
                    wp::ADMIN_USER,
                    wp::ADMIN_PASSWORD
                );
            }
        }
        FixturesSubcommand::Save { output } => {
            let service = config.descriptor(FIXTURES_SERVICE, &ProcessEnv)?;
            let out = output.unwrap_or_else(|| paths::fixtures_dump_path(root));
            let bytes = fixtures::save(&runner, &service, &out)?;
            if json {
                print_json(&serde_json::json!({
                    "service": service.name,
                    "path": out.display().to_string(),
                    "bytes": bytes,
                }))?;
            } else {
                println!("Saved {bytes} bytes to {}", out.display());
            }
        }
        FixturesSubcommand::Load { service, input } => {
            ServiceGroup::resolve(std::slice::from_ref(&service)).validate(config)?;
            let target = config.descriptor(&service, &ProcessEnv)?;
            let dump = input.unwrap_or_else(|| paths::fixtures_dump_path(root));
            if !dump.is_file() {
                anyhow::bail!("fixture dump not found: {}", dump.display());
            }
            let bytes = fixtures::load(&runner, &target, origin_port(config)?, &dump)?;
            if json {
                print_json(&serde_json::json!({
                    "service": target.name,
                    "path": dump.display().to_string(),
                    "bytes": bytes,
                    "site_url": wp::site_url(target.port),
                }))?;
            } else {
                println!(
                    "Loaded {} into {} ({})",
                    dump.display(),
                    target.name,
                    wp::site_url(target.port)
                );
            }
        }
    }
    Ok(())
}
