//! `.env` handling.
//!
//! The compose file and the provisioning code both read settings from `.env`.
//! A fresh checkout only has `.env.template`; the first run copies it and
//! stops so the developer can fill in the blanks.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Context;
use wpdev_core::{io, paths};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    /// `.env` already existed.
    Present,
    /// `.env` was just created from the template; the command should stop.
    Created,
}

/// Make sure `.env` exists. When it does not, wait for the developer to
/// press Enter on `input`, then copy `.env.template` into place.
pub fn ensure(root: &Path, input: &mut dyn BufRead) -> anyhow::Result<Bootstrap> {
    let env = paths::env_path(root);
    if env.is_file() {
        return Ok(Bootstrap::Present);
    }

    let template = paths::env_template_path(root);
    if !template.is_file() {
        anyhow::bail!(
            "`{}` is not found and there is no `{}` to create it from",
            env.display(),
            template.display()
        );
    }

    eprintln!("The `.env` file is not found!");
    eprint!("Press Enter to create it from `.env.template`...");
    std::io::stderr().flush()?;
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("failed to read confirmation")?;

    io::copy_if_missing(&template, &env)
        .with_context(|| format!("failed to create {}", env.display()))?;
    tracing::info!(path = %env.display(), "created from template");
    eprintln!("Done! Check the `.env` file, set missing values and re-run the command");
    Ok(Bootstrap::Created)
}

/// Load `.env` into the process environment. Variables that are already set
/// keep their value.
pub fn load(root: &Path) -> anyhow::Result<()> {
    let env = paths::env_path(root);
    dotenvy::from_path(&env).with_context(|| format!("failed to load {}", env.display()))?;
    Ok(())
}

/// Like [`load`], but a missing file is not an error.
pub fn load_if_present(root: &Path) -> anyhow::Result<()> {
    if paths::env_path(root).is_file() {
        load(root)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn existing_env_is_left_alone() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "A=1\n").unwrap();
        std::fs::write(dir.path().join(".env.template"), "A=\n").unwrap();

        let result = ensure(dir.path(), &mut "".as_bytes()).unwrap();
        assert_eq!(result, Bootstrap::Present);
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".env")).unwrap(),
            "A=1\n"
        );
    }

    #[test]
    fn template_is_copied_after_confirmation() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env.template"), "ORGANIC_DEMO_SITE_UUID=\n").unwrap();

        let result = ensure(dir.path(), &mut "\n".as_bytes()).unwrap();
        assert_eq!(result, Bootstrap::Created);
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".env")).unwrap(),
            "ORGANIC_DEMO_SITE_UUID=\n"
        );
    }

    #[test]
    fn missing_template_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = ensure(dir.path(), &mut "\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains(".env.template"));
        assert!(!dir.path().join(".env").exists());
    }

    #[test]
    fn load_if_present_tolerates_missing_file() {
        let dir = TempDir::new().unwrap();
        load_if_present(dir.path()).unwrap();
    }
}
