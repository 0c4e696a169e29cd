//! Host-side dependency caches (`vendor/`, `node_modules/`).
//!
//! They are produced by disposable composer/npm containers and bind-mounted
//! into the WordPress services. A cache is stale when its directory is
//! missing or older than its lockfile.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::Result;
use crate::runner::{Exec, ServiceRunner};
use crate::secrets::{self, EnvSource, COMPOSER_AUTH_VAR};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyCache {
    pub dir: &'static str,
    pub lockfile: &'static str,
    pub service: &'static str,
    pub install: &'static [&'static str],
    /// Forward `COMPOSER_AUTH` for private packages.
    pub needs_auth: bool,
}

pub const CACHES: &[DependencyCache] = &[
    DependencyCache {
        dir: "vendor",
        lockfile: "composer.lock",
        service: "composer",
        install: &["composer", "install", "--no-interaction"],
        needs_auth: true,
    },
    DependencyCache {
        dir: "node_modules",
        lockfile: "package-lock.json",
        service: "node",
        install: &["npm", "install"],
        needs_auth: false,
    },
];

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl DependencyCache {
    pub fn path(&self, root: &Path) -> PathBuf {
        root.join(self.dir)
    }

    pub fn is_stale(&self, root: &Path) -> bool {
        let dir = self.path(root);
        if !dir.is_dir() {
            return true;
        }
        match (modified(&root.join(self.lockfile)), modified(&dir)) {
            (Some(lock), Some(cache)) => lock > cache,
            _ => false,
        }
    }

    pub fn install(&self, runner: &dyn ServiceRunner, env: &dyn EnvSource) -> Result<()> {
        let mut exec = Exec::new(self.service, self.install.iter().copied());
        if self.needs_auth {
            exec = exec.env(COMPOSER_AUTH_VAR, secrets::require(env, COMPOSER_AUTH_VAR)?);
        }
        tracing::info!(service = self.service, dir = self.dir, "installing dependencies");
        runner.run_ephemeral(&exec)?;
        Ok(())
    }
}

/// Caches to (re)install: all of them when `force`, otherwise the stale ones.
pub fn pending(root: &Path, force: bool) -> Vec<&'static DependencyCache> {
    CACHES
        .iter()
        .filter(|c| force || c.is_stale(root))
        .collect()
}

pub fn cache_paths(root: &Path) -> Vec<PathBuf> {
    CACHES.iter().map(|c| c.path(root)).collect()
}
