//! Top-level workflows: bring environments up, tear them down, run the
//! plugin test suite.
//!
//! `up` fans out over the requested WordPress services one at a time. For a
//! single service the order is fixed: readiness check, provisioning (when the
//! site is not installed yet or a reset was requested), optional extras, then
//! the report.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{EnvironmentConfig, ServiceDescriptor, DEFAULT_WP_SERVICE};
use crate::deps::{self, DependencyCache};
use crate::error::{Result, WpdevError};
use crate::io;
use crate::paths;
use crate::provision::{ProvisioningRequest, Provisioner};
use crate::readiness;
use crate::runner::{DownOptions, Exec, ServiceRunner, UpOptions};
use crate::secrets::{self, EnvSource, Secrets};
use crate::wp;

/// wp-cli commands registered by the plugin that pull remote configuration.
pub const CONFIG_SYNC_COMMANDS: &[&str] = &[
    "organic-sync-plugin-config",
    "organic-sync-ad-config",
    "organic-sync-ads-txt",
    "organic-sync-affiliate-config",
];

pub const DEFAULT_TEST_EXCLUDE_GROUP: &str = "selenium_test";

// ---------------------------------------------------------------------------
// ServiceGroup
// ---------------------------------------------------------------------------

/// Ordered, duplicate-free set of services targeted by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceGroup(Vec<String>);

impl ServiceGroup {
    /// The requested services with duplicates removed, or the default
    /// WordPress service when none were requested.
    pub fn resolve(requested: &[String]) -> Self {
        if requested.is_empty() {
            return Self(vec![DEFAULT_WP_SERVICE.to_string()]);
        }
        let mut names: Vec<String> = Vec::with_capacity(requested.len());
        for name in requested {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        Self(names)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Every name must be a WordPress service declared in the compose file.
    pub fn validate(&self, config: &EnvironmentConfig) -> Result<()> {
        let known = config.wp_services();
        match self.0.iter().find(|n| !known.contains(&n.as_str())) {
            Some(unknown) => Err(WpdevError::ServiceNotFound(unknown.clone())),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests and reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpRequest {
    pub services: Vec<String>,
    pub build: bool,
    pub reset: bool,
    pub install_amp: bool,
    pub pull_configs: bool,
}

/// Everything `up` needs to know before it runs its first external command.
#[derive(Debug, Clone)]
pub struct UpPlan {
    pub group: ServiceGroup,
    pub secrets: Secrets,
    pub services: Vec<ServiceDescriptor>,
    pub dependencies: Vec<&'static DependencyCache>,
}

impl UpRequest {
    /// Resolve service names, ports, credentials and secrets. Pure: a
    /// configuration or secret problem surfaces here, before any container
    /// is touched.
    pub fn plan(
        &self,
        config: &EnvironmentConfig,
        env: &dyn EnvSource,
        root: &Path,
    ) -> Result<UpPlan> {
        let group = ServiceGroup::resolve(&self.services);
        group.validate(config)?;

        let secrets = Secrets::resolve(env)?;
        let services = group
            .names()
            .iter()
            .map(|name| config.descriptor(name, env))
            .collect::<Result<Vec<_>>>()?;

        let dependencies = deps::pending(root, self.build);
        if dependencies.iter().any(|c| c.needs_auth) {
            secrets::require(env, secrets::COMPOSER_AUTH_VAR)?;
        }

        Ok(UpPlan {
            group,
            secrets,
            services,
            dependencies,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteReport {
    pub service: String,
    pub port: u16,
    pub site_url: String,
    pub admin_url: String,
    pub admin_user: String,
    pub admin_password: String,
    /// Whether provisioning ran during this invocation.
    pub provisioned: bool,
}

impl SiteReport {
    pub fn new(service: &ServiceDescriptor, provisioned: bool) -> Self {
        Self {
            service: service.name.clone(),
            port: service.port,
            site_url: wp::site_url(service.port),
            admin_url: wp::admin_url(service.port),
            admin_user: wp::ADMIN_USER.to_string(),
            admin_password: wp::ADMIN_PASSWORD.to_string(),
            provisioned,
        }
    }
}

impl std::fmt::Display for SiteReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Done! The URLs for {}", self.service)?;
        writeln!(f, "Site:  {}", self.site_url)?;
        write!(
            f,
            "Admin: {} (user: {}, pass: {})",
            self.admin_url, self.admin_user, self.admin_password
        )
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator<'a> {
    runner: &'a dyn ServiceRunner,
    config: &'a EnvironmentConfig,
    env: &'a dyn EnvSource,
    root: &'a Path,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        runner: &'a dyn ServiceRunner,
        config: &'a EnvironmentConfig,
        env: &'a dyn EnvSource,
        root: &'a Path,
    ) -> Self {
        Self {
            runner,
            config,
            env,
            root,
        }
    }

    /// Start the requested services and make sure each one is provisioned.
    pub fn up(&self, request: &UpRequest) -> Result<Vec<SiteReport>> {
        let plan = request.plan(self.config, self.env, self.root)?;

        tracing::info!(services = ?plan.group.names(), build = request.build, "starting services");
        self.runner.up(
            &UpOptions {
                build: request.build,
            },
            plan.group.names(),
        )?;

        for cache in plan.dependencies {
            cache.install(self.runner, self.env)?;
        }

        plan.services
            .into_iter()
            .map(|service| self.bring_up(service, &plan.secrets, request))
            .collect()
    }

    fn bring_up(
        &self,
        service: ServiceDescriptor,
        secrets: &Secrets,
        request: &UpRequest,
    ) -> Result<SiteReport> {
        let name = service.name.clone();
        let ready = readiness::is_provisioned(self.runner, &name, &service.database)?;

        let provisioned = if !ready || request.reset {
            let provisioning = ProvisioningRequest {
                service: service.clone(),
                secrets: secrets.clone(),
                force_reset: request.reset,
            };
            Provisioner::new(self.runner).run(&provisioning)?;
            true
        } else {
            tracing::info!(service = %name, "already provisioned");
            false
        };

        if request.install_amp {
            tracing::info!(service = %name, "installing amp plugin");
            self.runner.exec(&wp::wp(
                &name,
                ["plugin", "install", "amp", "--activate", "--force"],
            ))?;
        }

        if request.pull_configs {
            for command in CONFIG_SYNC_COMMANDS {
                tracing::info!(service = %name, command, "pulling remote config");
                self.runner.exec(&wp::wp(&name, [*command]))?;
            }
        }

        Ok(SiteReport::new(&service, provisioned))
    }

    /// Stop everything. With `nuke`, also remove images and volumes and,
    /// if `confirm` agrees, the host dependency caches. Returns the removed
    /// cache directories.
    pub fn down(
        &self,
        nuke: bool,
        confirm: &mut dyn FnMut(&str) -> Result<bool>,
    ) -> Result<Vec<PathBuf>> {
        self.runner.down(&DownOptions {
            remove_images: nuke,
            remove_volumes: nuke,
        })?;
        if !nuke {
            return Ok(Vec::new());
        }

        let existing: Vec<PathBuf> = deps::cache_paths(self.root)
            .into_iter()
            .filter(|p| p.exists())
            .collect();
        if existing.is_empty() {
            return Ok(Vec::new());
        }

        let listing: Vec<String> = existing.iter().map(|p| p.display().to_string()).collect();
        let prompt = format!("Delete dependency caches {}?", listing.join(", "));
        if !confirm(&prompt)? {
            tracing::info!("keeping dependency caches");
            return Ok(Vec::new());
        }

        let mut removed = Vec::new();
        for path in existing {
            if io::remove_dir_if_exists(&path)? {
                tracing::info!(path = %path.display(), "removed");
                removed.push(path);
            }
        }
        Ok(removed)
    }

    /// Run the plugin's PHPUnit suite in each service. Services that are not
    /// running get a disposable container.
    pub fn run_tests(&self, services: &[String], exclude_groups: &[String]) -> Result<()> {
        let group = ServiceGroup::resolve(services);
        group.validate(self.config)?;
        let running = self.runner.running_services()?;

        let mut argv = vec!["vendor/bin/phpunit".to_string()];
        for g in exclude_groups {
            argv.push("--exclude-group".to_string());
            argv.push(g.clone());
        }

        for service in group.names() {
            let exec = Exec::new(service.as_str(), argv.clone()).workdir(paths::PLUGIN_DIR_IN_SERVICE);
            if running.contains(service) {
                tracing::info!(service = %service, "running tests");
                self.runner.exec(&exec)?;
            } else {
                tracing::info!(service = %service, "running tests in a disposable container");
                self.runner.run_ephemeral(&exec)?;
            }
        }
        Ok(())
    }

    /// Restart the given services, or all of them when none are named.
    pub fn restart(&self, services: &[String]) -> Result<()> {
        if let Some(unknown) = services.iter().find(|s| !self.config.contains(s)) {
            return Err(WpdevError::ServiceNotFound(unknown.clone()));
        }
        self.runner.restart(services)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
