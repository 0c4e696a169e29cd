use std::path::{Path, PathBuf};

use wpdev_core::paths::COMPOSE_FILE;

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `WPDEV_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `docker-compose.yml`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_compose_root(&cwd).unwrap_or(cwd)
}

/// Nearest ancestor of `start` (inclusive) holding a compose file.
pub fn find_compose_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(COMPOSE_FILE).is_file())
        .map(Path::to_path_buf)
}
