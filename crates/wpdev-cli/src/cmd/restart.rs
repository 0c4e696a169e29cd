use std::path::Path;

use wpdev_core::config::ConfigLoader;
use wpdev_core::orchestrator::Orchestrator;
use wpdev_core::runner::DockerCompose;
use wpdev_core::secrets::ProcessEnv;

pub fn run(root: &Path, services: &[String]) -> anyhow::Result<()> {
    let loader = ConfigLoader::new(root);
    let config = super::load_config(&loader)?;
    let runner = DockerCompose::new(root);
    Orchestrator::new(&runner, config, &ProcessEnv, root).restart(services)?;
    Ok(())
}
