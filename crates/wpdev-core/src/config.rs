use crate::error::{Result, WpdevError};
use crate::paths;
use crate::secrets::EnvSource;
use indexmap::IndexMap;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Service used when `up` is called without explicit service names.
pub const DEFAULT_WP_SERVICE: &str = "wp61-php74";
/// Prefix shared by every WordPress service in the compose file.
pub const WP_SERVICE_PREFIX: &str = "wp";

const DB_NAME_KEY: &str = "WORDPRESS_DB_NAME";

// ---------------------------------------------------------------------------
// Compose file schema (only the fields we read)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ComposeFile {
    #[serde(default)]
    pub services: IndexMap<String, ServiceEntry>,
    #[serde(rename = "x-vars", default)]
    pub vars: SharedVars,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SharedVars {
    #[serde(rename = "db-user", default)]
    pub db_user: Option<String>,
    #[serde(rename = "db-password", default)]
    pub db_password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceEntry {
    #[serde(default)]
    pub ports: Vec<PortEntry>,
    #[serde(default)]
    pub environment: ServiceEnvironment,
    /// Theme archive installed and activated during provisioning.
    #[serde(rename = "x-theme", default)]
    pub theme: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PortEntry {
    Short(String),
    Number(u32),
    Long {
        #[serde(default)]
        published: Option<serde_yaml::Value>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServiceEnvironment {
    Map(IndexMap<String, Option<serde_yaml::Value>>),
    List(Vec<String>),
}

impl Default for ServiceEnvironment {
    fn default() -> Self {
        ServiceEnvironment::Map(IndexMap::new())
    }
}

impl ServiceEnvironment {
    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            ServiceEnvironment::Map(map) => map.get(key)?.as_ref().and_then(scalar_to_string),
            ServiceEnvironment::List(items) => items.iter().find_map(|item| {
                let (k, v) = item.split_once('=')?;
                (k == key).then(|| v.to_string())
            }),
        }
    }
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Typed views handed to the rest of the crate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbCredentials {
    pub name: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub port: u16,
    pub database: DbCredentials,
    pub theme: Option<String>,
}

// ---------------------------------------------------------------------------
// EnvironmentConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    compose: ComposeFile,
}

impl EnvironmentConfig {
    pub fn from_yaml(data: &str) -> Result<Self> {
        let compose: ComposeFile = serde_yaml::from_str(data)?;
        Ok(Self { compose })
    }

    fn service(&self, service: &str) -> Result<&ServiceEntry> {
        self.compose
            .services
            .get(service)
            .ok_or_else(|| WpdevError::ServiceNotFound(service.to_string()))
    }

    pub fn contains(&self, service: &str) -> bool {
        self.compose.services.contains_key(service)
    }

    /// Service names starting with `prefix`, in declaration order.
    pub fn list_services(&self, prefix: &str) -> Vec<&str> {
        self.compose
            .services
            .keys()
            .filter(|name| name.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }

    pub fn wp_services(&self) -> Vec<&str> {
        self.list_services(WP_SERVICE_PREFIX)
    }

    /// Host port of the first published port mapping. `${VAR}` and
    /// `${VAR:-default}` references are resolved against `env`.
    pub fn port_of(&self, service: &str, env: &dyn EnvSource) -> Result<u16> {
        let entry = self.service(service)?;
        let missing = || WpdevError::MissingField {
            service: service.to_string(),
            field: "ports".to_string(),
        };
        let raw = match entry.ports.first().ok_or_else(missing)? {
            PortEntry::Short(s) => host_port_of_short_syntax(&interpolate(s, env)?),
            PortEntry::Number(_) => None,
            PortEntry::Long { published } => match published.as_ref().and_then(scalar_to_string) {
                Some(p) => Some(interpolate(&p, env)?),
                None => None,
            },
        };
        raw.and_then(|p| p.trim().parse::<u16>().ok())
            .ok_or_else(missing)
    }

    pub fn credentials_of(&self, service: &str) -> Result<DbCredentials> {
        let entry = self.service(service)?;
        let name = entry
            .environment
            .get(DB_NAME_KEY)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| WpdevError::MissingField {
                service: service.to_string(),
                field: format!("environment.{DB_NAME_KEY}"),
            })?;
        paths::validate_identifier(&name)?;

        let shared = |value: &Option<String>, field: &str| {
            value.clone().ok_or_else(|| WpdevError::MissingField {
                service: "x-vars".to_string(),
                field: field.to_string(),
            })
        };
        Ok(DbCredentials {
            name,
            user: shared(&self.compose.vars.db_user, "db-user")?,
            password: shared(&self.compose.vars.db_password, "db-password")?,
        })
    }

    pub fn theme_of(&self, service: &str) -> Option<&str> {
        self.compose
            .services
            .get(service)
            .and_then(|s| s.theme.as_deref())
    }

    pub fn descriptor(&self, service: &str, env: &dyn EnvSource) -> Result<ServiceDescriptor> {
        Ok(ServiceDescriptor {
            name: service.to_string(),
            port: self.port_of(service, env)?,
            database: self.credentials_of(service)?,
            theme: self.theme_of(service).map(str::to_string),
        })
    }
}

/// `8080:80` → `8080`, `127.0.0.1:8080:80/tcp` → `8080`. A bare container
/// port has no host side.
fn host_port_of_short_syntax(mapping: &str) -> Option<String> {
    let parts: Vec<&str> = mapping.split(':').collect();
    match parts.as_slice() {
        [host, _container] => Some(host.to_string()),
        [_ip, host, _container] => Some(host.to_string()),
        _ => None,
    }
}

static VAR_RE: OnceLock<Regex> = OnceLock::new();

fn var_re() -> &'static Regex {
    VAR_RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::?-([^}]*))?\}").unwrap()
    })
}

fn interpolate(value: &str, env: &dyn EnvSource) -> Result<String> {
    let mut missing = None;
    let out = var_re().replace_all(value, |caps: &Captures| {
        let name = &caps[1];
        match (env.var(name).filter(|v| !v.is_empty()), caps.get(2)) {
            (Some(v), _) => v,
            (None, Some(default)) => default.as_str().to_string(),
            (None, None) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });
    match missing {
        Some(name) => Err(WpdevError::MissingSecret(name)),
        None => Ok(out.into_owned()),
    }
}

// ---------------------------------------------------------------------------
// ConfigLoader
// ---------------------------------------------------------------------------

/// Reads the compose file at most once per loader and hands out the cached
/// value on every later call.
#[derive(Debug)]
pub struct ConfigLoader {
    path: PathBuf,
    cached: OnceLock<EnvironmentConfig>,
}

impl ConfigLoader {
    pub fn new(root: &Path) -> Self {
        Self {
            path: paths::compose_path(root),
            cached: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<&EnvironmentConfig> {
        if let Some(cfg) = self.cached.get() {
            return Ok(cfg);
        }
        if !self.path.exists() {
            return Err(WpdevError::ConfigNotFound(self.path.clone()));
        }
        let data = std::fs::read_to_string(&self.path)?;
        let cfg = EnvironmentConfig::from_yaml(&data)?;
        tracing::debug!(path = %self.path.display(), "loaded compose file");
        Ok(self.cached.get_or_init(|| cfg))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
