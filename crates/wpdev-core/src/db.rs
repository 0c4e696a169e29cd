use crate::config::DbCredentials;
use crate::error::Result;
use crate::paths;
use crate::runner::{CommandResult, Exec, ServiceRunner};

/// Compose service running the MySQL server.
pub const DB_SERVICE: &str = "db";

/// Options seeded into a fresh install so the plugin starts enabled and
/// pointed at the demo site.
const PLUGIN_OPTIONS: &[(&str, &str)] = &[
    ("organic::enabled", "1"),
    ("organic::percent_test", ""),
    ("organic::test_value", ""),
    ("organic::sdk_version", "v2"),
    ("organic::cmp", ""),
    ("organic::one_trust_id", ""),
    ("organic::amp_ads_enabled", "1"),
    ("organic::ad_slots_prefill_enabled", "1"),
    ("organic::affiliate_enabled", "1"),
    ("organic::ads_txt_redirect_enabled", "1"),
    (
        "organic::post_types",
        r#"a:2:{i:0;s:4:"post";i:1;s:4:"page";}"#,
    ),
];

/// SQL client bound to one set of credentials. Statements are piped to
/// `mysql` on stdin and the password travels in `MYSQL_PWD`.
pub struct Database<'a> {
    runner: &'a dyn ServiceRunner,
    creds: &'a DbCredentials,
}

impl<'a> Database<'a> {
    pub fn new(runner: &'a dyn ServiceRunner, creds: &'a DbCredentials) -> Self {
        Self { runner, creds }
    }

    fn client(&self, argv: Vec<String>) -> Exec {
        Exec::new(DB_SERVICE, argv).env("MYSQL_PWD", self.creds.password.clone())
    }

    pub fn execute(&self, sql: &str) -> Result<CommandResult> {
        let exec = self
            .client(vec!["mysql".to_string(), format!("-u{}", self.creds.user)])
            .stdin(sql);
        self.runner.exec(&exec)
    }

    pub fn create_if_absent(&self) -> Result<()> {
        self.execute(&create_database_sql(&self.creds.name)?)?;
        Ok(())
    }

    pub fn reset(&self) -> Result<()> {
        self.execute(&reset_database_sql(&self.creds.name)?)?;
        Ok(())
    }

    /// Load a SQL dump into the bound database. The dump is piped as raw
    /// bytes.
    pub fn import(&self, dump: &[u8]) -> Result<()> {
        paths::validate_identifier(&self.creds.name)?;
        let exec = self
            .client(vec![
                "mysql".to_string(),
                format!("-u{}", self.creds.user),
                self.creds.name.clone(),
            ])
            .stdin(dump);
        self.runner.exec(&exec)?;
        Ok(())
    }

    /// Dump the bound database. The bytes are returned exactly as
    /// `mysqldump` wrote them.
    pub fn dump(&self) -> Result<Vec<u8>> {
        paths::validate_identifier(&self.creds.name)?;
        let exec = self
            .client(vec![
                "mysqldump".to_string(),
                "--max_allowed_packet=1G".to_string(),
                "--single-transaction".to_string(),
                format!("-u{}", self.creds.user),
                self.creds.name.clone(),
            ])
            .capture();
        let result = self.runner.exec(&exec)?;
        Ok(result.stdout.unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Statement builders
// ---------------------------------------------------------------------------

/// Quote a value as a MySQL string literal.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

pub fn create_database_sql(db_name: &str) -> Result<String> {
    paths::validate_identifier(db_name)?;
    Ok(format!("CREATE DATABASE IF NOT EXISTS {db_name};\n"))
}

pub fn reset_database_sql(db_name: &str) -> Result<String> {
    paths::validate_identifier(db_name)?;
    Ok(format!(
        "DROP DATABASE IF EXISTS {db_name};\nCREATE DATABASE IF NOT EXISTS {db_name};\n"
    ))
}

/// Insert the plugin options into a freshly installed site. Duplicates are
/// ignored so a partially seeded table does not abort the run.
pub fn seed_options_sql(db_name: &str, site_id: &str, api_key: &str) -> Result<String> {
    paths::validate_identifier(db_name)?;
    let mut rows: Vec<(&str, &str)> = PLUGIN_OPTIONS.to_vec();
    rows.push(("organic::sdk_key", api_key));
    rows.push(("organic::site_id", site_id));

    let values: Vec<String> = rows
        .iter()
        .map(|(name, value)| format!("({},{},'no')", quote(name), quote(value)))
        .collect();
    Ok(format!(
        "INSERT IGNORE INTO {db_name}.wp_options (option_name,option_value,autoload) VALUES\n  {};\n",
        values.join(",\n  ")
    ))
}

/// Strip transients and login sessions before a fixtures dump.
pub fn purge_volatile_rows_sql(db_name: &str) -> Result<String> {
    paths::validate_identifier(db_name)?;
    Ok(format!(
        "DELETE FROM {db_name}.wp_options WHERE option_name LIKE '\\_site\\_transient%';\n\
         DELETE FROM {db_name}.wp_options WHERE option_name LIKE '\\_transient%';\n\
         DELETE FROM {db_name}.wp_usermeta WHERE meta_key = 'session_tokens';\n"
    ))
}
