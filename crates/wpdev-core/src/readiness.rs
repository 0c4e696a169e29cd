use crate::config::DbCredentials;
use crate::db::Database;
use crate::error::Result;
use crate::runner::{Exec, ServiceRunner};

/// Polls for `wp-config.php` every 100ms, 600 times: one minute.
pub const WP_CONFIG_WAIT_ATTEMPTS: u32 = 600;

/// The WordPress image writes `wp-config.php` on first start; wp-cli cannot
/// answer anything before it exists. The loop exits 1 once `attempts` polls
/// came up empty.
pub fn wait_for_wp_config_script(attempts: u32) -> String {
    format!(
        "i=0; while [ ! -f ./wp-config.php ]; do \
         i=$((i+1)); [ \"$i\" -gt {attempts} ] && exit 1; sleep 0.1; done"
    )
}

/// Whether `service` already holds a finished WordPress install.
///
/// Makes sure the service database exists first, so the check never fails
/// just because the database server was recreated. A failing check means
/// "not installed", not an error.
pub fn is_provisioned(
    runner: &dyn ServiceRunner,
    service: &str,
    creds: &DbCredentials,
) -> Result<bool> {
    Database::new(runner, creds).create_if_absent()?;

    let wait = wait_for_wp_config_script(WP_CONFIG_WAIT_ATTEMPTS);
    runner.exec(&Exec::new(service, ["sh", "-c", wait.as_str()]))?;

    let installed = runner.exec(
        &Exec::new(service, ["wp", "--allow-root", "core", "is-installed"]).tolerate_failure(),
    )?;
    tracing::debug!(service, exit_code = installed.exit_code, "install check");
    Ok(installed.succeeded())
}
