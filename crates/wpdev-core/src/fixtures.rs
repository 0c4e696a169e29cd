//! Regenerating the fixture dataset.
//!
//! `setup` turns the fixtures service into an empty site with FakerPress so
//! new content can be generated by hand; `save` then cleans volatile rows out
//! of its database and dumps it to the host. `load` replaces the database of
//! any WordPress service with that dump.

use std::path::Path;
use std::sync::OnceLock;

use regex::bytes::{Captures, Regex};

use crate::config::ServiceDescriptor;
use crate::db::{self, Database};
use crate::error::Result;
use crate::io;
use crate::runner::ServiceRunner;
use crate::wp;

/// Service whose database is the source of the fixture dump.
pub const FIXTURES_SERVICE: &str = "wp49-php72";
pub const FIXTURES_SITE_TITLE: &str = "Organic WP Plugin Demo";

/// Host port baked into dumps when the fixtures service is not declared.
pub const DEFAULT_ORIGIN_PORT: u16 = 8031;

pub fn setup(runner: &dyn ServiceRunner, service: &ServiceDescriptor) -> Result<()> {
    tracing::info!(service = %service.name, "preparing fixtures environment");
    Database::new(runner, &service.database).reset()?;
    runner.exec(&wp::core_install(
        &service.name,
        service.port,
        FIXTURES_SITE_TITLE,
    ))?;
    runner.exec(&wp::wp(
        &service.name,
        ["plugin", "install", "fakerpress", "--activate"],
    ))?;
    Ok(())
}

/// Dump the fixtures service database to `out`. Returns the dump size in bytes.
pub fn save(runner: &dyn ServiceRunner, service: &ServiceDescriptor, out: &Path) -> Result<usize> {
    runner.exec(&wp::wp(&service.name, ["cache", "flush"]))?;
    runner.exec(&wp::wp(&service.name, ["transient", "delete", "--all"]))?;

    let database = Database::new(runner, &service.database);
    database.execute(&db::purge_volatile_rows_sql(&service.database.name)?)?;
    let dump = database.dump()?;

    io::atomic_write(out, &dump)?;
    tracing::info!(path = %out.display(), bytes = dump.len(), "saved fixtures");
    Ok(dump.len())
}

static SITE_HOST_RE: OnceLock<Regex> = OnceLock::new();

fn site_host_re() -> &'static Regex {
    SITE_HOST_RE.get_or_init(|| Regex::new(r"localhost:([0-9]+)").unwrap())
}

/// Point every `localhost:<origin_port>` URL in `dump` at `target_port`.
/// Works on raw bytes so non-UTF-8 rows pass through untouched.
pub fn rewrite_site_port(dump: &[u8], origin_port: u16, target_port: u16) -> Vec<u8> {
    if origin_port == target_port {
        return dump.to_vec();
    }
    let origin = origin_port.to_string();
    let target = format!("localhost:{target_port}");
    site_host_re()
        .replace_all(dump, |caps: &Captures| {
            if &caps[1] == origin.as_bytes() {
                target.as_bytes().to_vec()
            } else {
                caps[0].to_vec()
            }
        })
        .into_owned()
}

/// Replace the database of `service` with the dump at `dump_path`, taken
/// from a site served on `origin_port`. Returns the imported size in bytes.
pub fn load(
    runner: &dyn ServiceRunner,
    service: &ServiceDescriptor,
    origin_port: u16,
    dump_path: &Path,
) -> Result<usize> {
    let dump = std::fs::read(dump_path)?;
    let dump = rewrite_site_port(&dump, origin_port, service.port);

    tracing::info!(service = %service.name, path = %dump_path.display(), "loading fixtures");
    let database = Database::new(runner, &service.database);
    database.reset()?;
    database.import(&dump)?;

    runner.exec(&wp::wp(&service.name, ["core", "update-db"]))?;
    if let Some(theme) = &service.theme {
        runner.exec(&wp::wp(&service.name, ["theme", "activate", theme.as_str()]))?;
    }
    Ok(dump.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbCredentials;
    use crate::testing::FakeRunner;
    use tempfile::TempDir;

    fn descriptor() -> ServiceDescriptor {
        ServiceDescriptor {
            name: FIXTURES_SERVICE.to_string(),
            port: 8049,
            database: DbCredentials {
                name: "wp49_php72".to_string(),
                user: "wordpress".to_string(),
                password: "secret".to_string(),
            },
            theme: None,
        }
    }

    fn target(theme: Option<&str>) -> ServiceDescriptor {
        ServiceDescriptor {
            name: "wp61-php74".to_string(),
            port: 8061,
            database: DbCredentials {
                name: "wp61_php74".to_string(),
                user: "wordpress".to_string(),
                password: "secret".to_string(),
            },
            theme: theme.map(str::to_string),
        }
    }

    #[test]
    fn setup_resets_installs_and_adds_fakerpress() {
        let runner = FakeRunner::new(&[(FIXTURES_SERVICE, "wp49_php72")]);
        setup(&runner, &descriptor()).unwrap();

        let lines = runner.command_lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("DROP DATABASE IF EXISTS wp49_php72"));
        assert!(lines[1].contains("--title=Organic WP Plugin Demo"));
        assert!(lines[2].contains("plugin install fakerpress --activate"));
    }

    #[test]
    fn save_cleans_then_dumps_to_host() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("fixtures/wpdb.sql");
        let runner = FakeRunner::new(&[(FIXTURES_SERVICE, "wp49_php72")]);
        runner.set_stdout("mysqldump", "-- dump of wp49_php72\n");

        let bytes = save(&runner, &descriptor(), &out).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "-- dump of wp49_php72\n");
        assert_eq!(bytes, 22);

        let lines = runner.command_lines();
        assert!(lines[0].ends_with("cache flush"));
        assert!(lines[1].ends_with("transient delete --all"));
        assert!(lines[2].contains("session_tokens"));
        assert!(lines[3].contains("mysqldump"));
    }

    #[test]
    fn failed_dump_leaves_previous_file() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("wpdb.sql");
        std::fs::write(&out, "-- previous\n").unwrap();
        let runner = FakeRunner::new(&[(FIXTURES_SERVICE, "wp49_php72")]);
        runner.fail_on("mysqldump");

        assert!(save(&runner, &descriptor(), &out).is_err());
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "-- previous\n");
    }

    #[test]
    fn save_writes_dump_bytes_verbatim() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("wpdb.sql");
        let runner = FakeRunner::new(&[(FIXTURES_SERVICE, "wp49_php72")]);
        runner.set_stdout("mysqldump", b"INSERT VALUES ('caf\xe9');\n");

        save(&runner, &descriptor(), &out).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"INSERT VALUES ('caf\xe9');\n");
    }

    #[test]
    fn rewrite_moves_urls_to_target_port_only() {
        let dump = b"'http://localhost:8031/','http://localhost:80310/','caf\xe9'";
        let rewritten = rewrite_site_port(dump, 8031, 8061);
        assert_eq!(
            rewritten,
            b"'http://localhost:8061/','http://localhost:80310/','caf\xe9'"
        );
        assert_eq!(rewrite_site_port(b"localhost:8031", 8031, 8061), b"localhost:8061");
        assert_eq!(rewrite_site_port(dump, 8031, 8031), dump.to_vec());
    }

    #[test]
    fn load_resets_imports_rewritten_dump_then_updates_site() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wpdb.sql");
        std::fs::write(&path, "UPDATE wp_options SET option_value='http://localhost:8031';\n")
            .unwrap();
        let runner = FakeRunner::new(&[("wp61-php74", "wp61_php74")]);

        load(&runner, &target(Some("twentytwenty")), DEFAULT_ORIGIN_PORT, &path).unwrap();

        let lines = runner.command_lines();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("DROP DATABASE IF EXISTS wp61_php74"));
        assert!(lines[1].starts_with("db: mysql -uwordpress wp61_php74 <<< "));
        assert!(lines[1].contains("http://localhost:8061"));
        assert!(!lines[1].contains("localhost:8031"));
        assert!(lines[2].ends_with("wp --allow-root core update-db"));
        assert!(lines[3].ends_with("theme activate twentytwenty"));
    }

    #[test]
    fn load_without_theme_skips_activation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wpdb.sql");
        std::fs::write(&path, "-- empty\n").unwrap();
        let runner = FakeRunner::new(&[("wp61-php74", "wp61_php74")]);

        load(&runner, &target(None), DEFAULT_ORIGIN_PORT, &path).unwrap();
        assert_eq!(runner.count_matching("theme activate"), 0);
        assert_eq!(runner.count_matching("core update-db"), 1);
    }

    #[test]
    fn load_with_missing_dump_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::new(&[("wp61-php74", "wp61_php74")]);
        let err = load(
            &runner,
            &target(None),
            DEFAULT_ORIGIN_PORT,
            &dir.path().join("missing.sql"),
        )
        .unwrap_err();
        assert!(matches!(err, crate::error::WpdevError::Io(_)));
        assert!(runner.calls().is_empty());
    }
}
