//! Provisioning state machine.
//!
//! Takes one WordPress service from "container started, database possibly
//! dirty" to a fully configured site:
//!
//! ```text
//! DatabaseReset -> ApplicationInstalled -> [ThemeInstalled] -> FixturesLoaded
//!               -> PluginActivated -> OptionsSeeded
//! ```
//!
//! Steps run strictly in that order. There is no retry and no rollback: the
//! first failure aborts the run and leaves the site half provisioned. The
//! next run starts with `DatabaseReset`, which drops everything, so running
//! again is the recovery path.

use crate::config::ServiceDescriptor;
use crate::db::{self, Database};
use crate::error::Result;
use crate::paths;
use crate::runner::ServiceRunner;
use crate::secrets::{EnvSource, Secrets};
use crate::wp;

// ---------------------------------------------------------------------------
// ProvisionStep
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvisionStep {
    DatabaseReset,
    ApplicationInstalled,
    ThemeInstalled,
    FixturesLoaded,
    PluginActivated,
    OptionsSeeded,
}

impl ProvisionStep {
    pub const ALL: [ProvisionStep; 6] = [
        ProvisionStep::DatabaseReset,
        ProvisionStep::ApplicationInstalled,
        ProvisionStep::ThemeInstalled,
        ProvisionStep::FixturesLoaded,
        ProvisionStep::PluginActivated,
        ProvisionStep::OptionsSeeded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionStep::DatabaseReset => "database_reset",
            ProvisionStep::ApplicationInstalled => "application_installed",
            ProvisionStep::ThemeInstalled => "theme_installed",
            ProvisionStep::FixturesLoaded => "fixtures_loaded",
            ProvisionStep::PluginActivated => "plugin_activated",
            ProvisionStep::OptionsSeeded => "options_seeded",
        }
    }

    pub fn next(self) -> Option<ProvisionStep> {
        let idx = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl std::fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ProvisioningRequest
// ---------------------------------------------------------------------------

/// One provisioning attempt. It cannot be built without both secrets, so a
/// missing variable stops the run before anything touches the database.
#[derive(Debug, Clone)]
pub struct ProvisioningRequest {
    pub service: ServiceDescriptor,
    pub secrets: Secrets,
    pub force_reset: bool,
}

impl ProvisioningRequest {
    pub fn new(service: ServiceDescriptor, env: &dyn EnvSource, force_reset: bool) -> Result<Self> {
        Ok(Self {
            service,
            secrets: Secrets::resolve(env)?,
            force_reset,
        })
    }
}

// ---------------------------------------------------------------------------
// Provisioner
// ---------------------------------------------------------------------------

pub fn site_title(service: &str) -> String {
    format!("Organic WP Plugin ({service})")
}

pub struct Provisioner<'a> {
    runner: &'a dyn ServiceRunner,
}

impl<'a> Provisioner<'a> {
    pub fn new(runner: &'a dyn ServiceRunner) -> Self {
        Self { runner }
    }

    /// Steps that apply to this service, in execution order.
    pub fn plan(&self, request: &ProvisioningRequest) -> Vec<ProvisionStep> {
        ProvisionStep::ALL
            .into_iter()
            .filter(|step| {
                *step != ProvisionStep::ThemeInstalled || request.service.theme.is_some()
            })
            .collect()
    }

    /// Run every planned step. Returns the steps that were applied.
    pub fn run(&self, request: &ProvisioningRequest) -> Result<Vec<ProvisionStep>> {
        let service = request.service.name.as_str();
        tracing::info!(service, force_reset = request.force_reset, "provisioning");

        let plan = self.plan(request);
        for step in &plan {
            tracing::info!(service, step = %step, "provisioning step");
            self.apply(*step, request)?;
        }
        tracing::info!(service, "provisioned");
        Ok(plan)
    }

    pub fn apply(&self, step: ProvisionStep, request: &ProvisioningRequest) -> Result<()> {
        let svc = &request.service;
        let database = Database::new(self.runner, &svc.database);

        match step {
            ProvisionStep::DatabaseReset => database.reset(),
            ProvisionStep::ApplicationInstalled => {
                let exec = wp::core_install(&svc.name, svc.port, &site_title(&svc.name));
                self.runner.exec(&exec).map(|_| ())
            }
            ProvisionStep::ThemeInstalled => match &svc.theme {
                Some(theme) => {
                    let archive = paths::theme_archive_in_service(theme);
                    let exec = wp::wp(
                        &svc.name,
                        ["theme", "install", archive.as_str(), "--activate", "--force"],
                    );
                    self.runner.exec(&exec).map(|_| ())
                }
                None => Ok(()),
            },
            ProvisionStep::FixturesLoaded => {
                let file = format!("--file={}", paths::FIXTURES_FILE_IN_SERVICE);
                let exec = wp::wp(&svc.name, ["fixtures", "load", file.as_str()]);
                self.runner.exec(&exec).map(|_| ())
            }
            ProvisionStep::PluginActivated => {
                let exec = wp::wp(&svc.name, ["plugin", "activate", wp::PLUGIN_PATH]);
                self.runner.exec(&exec).map(|_| ())
            }
            ProvisionStep::OptionsSeeded => {
                let sql = db::seed_options_sql(
                    &svc.database.name,
                    &request.secrets.site_id,
                    &request.secrets.api_key,
                )?;
                database.execute(&sql).map(|_| ())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
