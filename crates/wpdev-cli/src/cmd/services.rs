use std::path::Path;

use serde::Serialize;
use wpdev_cli::output::{print_json, print_table};
use wpdev_core::config::{ConfigLoader, DEFAULT_WP_SERVICE};
use wpdev_core::secrets::ProcessEnv;

#[derive(Serialize)]
struct ServiceRow {
    service: String,
    port: u16,
    database: String,
    theme: Option<String>,
    default: bool,
}

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let loader = ConfigLoader::new(root);
    let config = super::load_config(&loader)?;

    let rows = config
        .wp_services()
        .into_iter()
        .map(|name| -> wpdev_core::Result<ServiceRow> {
            let d = config.descriptor(name, &ProcessEnv)?;
            Ok(ServiceRow {
                default: d.name == DEFAULT_WP_SERVICE,
                service: d.name,
                port: d.port,
                database: d.database.name,
                theme: d.theme,
            })
        })
        .collect::<wpdev_core::Result<Vec<_>>>()?;

    if json {
        return print_json(&rows);
    }

    if rows.is_empty() {
        println!("No WordPress services in {}.", loader.path().display());
        return Ok(());
    }

    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            let name = if r.default {
                format!("{} (default)", r.service)
            } else {
                r.service.clone()
            };
            vec![
                name,
                r.port.to_string(),
                r.database.clone(),
                r.theme.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    print_table(&["SERVICE", "PORT", "DATABASE", "THEME"], &table);
    Ok(())
}
