//! Required environment variables.
//!
//! Values normally come from the process environment (the CLI loads `.env`
//! into it at startup). Everything that reads a variable goes through
//! [`EnvSource`] so tests can supply a plain map instead.

use crate::error::{Result, WpdevError};
use std::collections::HashMap;

pub const SITE_ID_VAR: &str = "ORGANIC_DEMO_SITE_UUID";
pub const API_KEY_VAR: &str = "ORGANIC_DEMO_SITE_APIKEY";
pub const COMPOSER_AUTH_VAR: &str = "COMPOSER_AUTH";

pub trait EnvSource {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Look up a variable that must be set and non-empty.
pub fn require(env: &dyn EnvSource, name: &str) -> Result<String> {
    match env.var(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(WpdevError::MissingSecret(name.to_string())),
    }
}

/// The two values seeded into the plugin options of every provisioned site.
#[derive(Clone, PartialEq, Eq)]
pub struct Secrets {
    pub site_id: String,
    pub api_key: String,
}

impl Secrets {
    pub fn resolve(env: &dyn EnvSource) -> Result<Self> {
        Ok(Self {
            site_id: require(env, SITE_ID_VAR)?,
            api_key: require(env, API_KEY_VAR)?,
        })
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("site_id", &self.site_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
