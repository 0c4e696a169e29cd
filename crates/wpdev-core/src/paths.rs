use crate::error::{Result, WpdevError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Host-side files
// ---------------------------------------------------------------------------

pub const COMPOSE_FILE: &str = "docker-compose.yml";
pub const ENV_FILE: &str = ".env";
pub const ENV_TEMPLATE: &str = ".env.template";
pub const FIXTURES_DUMP: &str = "fixtures/wpdb.sql";

// ---------------------------------------------------------------------------
// Paths inside the WordPress services
// ---------------------------------------------------------------------------

pub const PLUGIN_DIR_IN_SERVICE: &str = "/var/www/html/wp-content/plugins/wordpress-plugin";
pub const FIXTURES_FILE_IN_SERVICE: &str = "/tmp/dev/fixtures.yml";
pub const THEMES_DIR_IN_SERVICE: &str = "/tmp/dev/themes";

pub fn compose_path(root: &Path) -> PathBuf {
    root.join(COMPOSE_FILE)
}

pub fn env_path(root: &Path) -> PathBuf {
    root.join(ENV_FILE)
}

pub fn env_template_path(root: &Path) -> PathBuf {
    root.join(ENV_TEMPLATE)
}

pub fn fixtures_dump_path(root: &Path) -> PathBuf {
    root.join(FIXTURES_DUMP)
}

/// Theme archives live next to the fixtures inside the service; a bare name
/// resolves to `<themes dir>/<name>.zip`, anything with a slash is used as is.
pub fn theme_archive_in_service(theme: &str) -> String {
    if theme.contains('/') {
        theme.to_string()
    } else {
        format!("{THEMES_DIR_IN_SERVICE}/{theme}.zip")
    }
}

// ---------------------------------------------------------------------------
// Identifier validation
// ---------------------------------------------------------------------------

static IDENT_RE: OnceLock<Regex> = OnceLock::new();

fn ident_re() -> &'static Regex {
    IDENT_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap())
}

/// Database names end up inside SQL statements unquoted, so only plain
/// identifiers are accepted.
pub fn validate_identifier(ident: &str) -> Result<()> {
    if ident.len() > 64 || !ident_re().is_match(ident) {
        return Err(WpdevError::InvalidIdentifier(ident.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
