use std::io::{BufRead, Write};
use std::path::Path;

use wpdev_cli::output::print_json;
use wpdev_core::config::ConfigLoader;
use wpdev_core::orchestrator::Orchestrator;
use wpdev_core::runner::DockerCompose;
use wpdev_core::secrets::ProcessEnv;

pub fn run(root: &Path, nuke: bool, yes: bool, json: bool) -> anyhow::Result<()> {
    let loader = ConfigLoader::new(root);
    let config = super::load_config(&loader)?;
    let runner = DockerCompose::new(root);

    let mut confirm = |prompt: &str| -> wpdev_core::Result<bool> {
        if yes {
            return Ok(true);
        }
        eprint!("{prompt} [y/N] ");
        std::io::stderr().flush()?;
        let mut input = String::new();
        std::io::stdin().lock().read_line(&mut input)?;
        Ok(input.trim().eq_ignore_ascii_case("y"))
    };

    let removed = Orchestrator::new(&runner, config, &ProcessEnv, root).down(nuke, &mut confirm)?;

    if json {
        #[derive(serde::Serialize)]
        struct DownOutput {
            nuke: bool,
            removed: Vec<String>,
        }
        print_json(&DownOutput {
            nuke,
            removed: removed.iter().map(|p| p.display().to_string()).collect(),
        })?;
    } else {
        for path in &removed {
            println!("Removed {}", path.display());
        }
    }
    Ok(())
}
