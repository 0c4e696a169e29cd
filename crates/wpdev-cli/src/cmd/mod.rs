pub mod down;
pub mod fixtures;
pub mod restart;
pub mod services;
pub mod up;

use anyhow::Context;
use wpdev_core::config::{ConfigLoader, EnvironmentConfig};

pub(crate) fn load_config(loader: &ConfigLoader) -> anyhow::Result<&EnvironmentConfig> {
    loader
        .load()
        .with_context(|| format!("failed to load {}", loader.path().display()))
}
