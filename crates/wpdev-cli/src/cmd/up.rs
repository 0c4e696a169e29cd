use std::path::Path;

use wpdev_cli::output::print_json;
use wpdev_core::config::ConfigLoader;
use wpdev_core::orchestrator::{Orchestrator, UpRequest};
use wpdev_core::runner::DockerCompose;
use wpdev_core::secrets::ProcessEnv;

pub fn run(root: &Path, request: UpRequest, json: bool) -> anyhow::Result<()> {
    let loader = ConfigLoader::new(root);
    let config = super::load_config(&loader)?;
    let runner = DockerCompose::new(root);

    let reports = Orchestrator::new(&runner, config, &ProcessEnv, root).up(&request)?;

    if json {
        print_json(&reports)?;
    } else {
        for report in &reports {
            println!("{report}");
        }
    }
    Ok(())
}
