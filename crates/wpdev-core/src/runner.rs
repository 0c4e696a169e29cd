//! Structured invocation of `docker compose`.
//!
//! Every command is an argument vector handed straight to the `docker`
//! binary; nothing goes through a shell. Values that must stay off the
//! command line (database passwords, auth tokens) are forwarded with a bare
//! `--env NAME` flag while the value itself is set on the `docker` process
//! environment, from where compose copies it into the container.
//!
//! # Failure policy
//! A non-zero exit code is turned into [`WpdevError::CommandFailed`] unless
//! the caller opted out with [`Exec::tolerate_failure`].

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use crate::error::{Result, WpdevError};

// ---------------------------------------------------------------------------
// Exec
// ---------------------------------------------------------------------------

/// A command to run inside a compose service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exec {
    pub service: String,
    pub argv: Vec<String>,
    pub env: Vec<(String, String)>,
    pub stdin: Option<Vec<u8>>,
    pub workdir: Option<String>,
    pub capture: bool,
    pub check: bool,
}

impl Exec {
    pub fn new<I, S>(service: impl Into<String>, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            service: service.into(),
            argv: argv.into_iter().map(Into::into).collect(),
            env: Vec::new(),
            stdin: None,
            workdir: None,
            capture: false,
            check: true,
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn workdir(mut self, dir: impl Into<String>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn capture(mut self) -> Self {
        self.capture = true;
        self
    }

    pub fn tolerate_failure(mut self) -> Self {
        self.check = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandResult {
    pub exit_code: i32,
    /// Raw bytes: database dumps are not guaranteed to be UTF-8.
    pub stdout: Option<Vec<u8>>,
    pub stderr: Option<String>,
}

impl CommandResult {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_text(&self) -> String {
        self.stdout
            .as_deref()
            .map(|out| String::from_utf8_lossy(out).into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpOptions {
    /// Rebuild images and renew anonymous volumes so build artifacts baked
    /// into the image are not masked by stale volume contents.
    pub build: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownOptions {
    pub remove_images: bool,
    pub remove_volumes: bool,
}

// ---------------------------------------------------------------------------
// ServiceRunner
// ---------------------------------------------------------------------------

pub trait ServiceRunner {
    /// Run inside an already running service.
    fn exec(&self, exec: &Exec) -> Result<CommandResult>;

    /// Build the service image if needed, start a disposable container, run
    /// the command, and remove the container afterwards.
    fn run_ephemeral(&self, exec: &Exec) -> Result<CommandResult>;

    fn running_services(&self) -> Result<Vec<String>>;

    fn is_running(&self, service: &str) -> Result<bool> {
        Ok(self.running_services()?.iter().any(|s| s == service))
    }

    fn up(&self, opts: &UpOptions, services: &[String]) -> Result<()>;

    fn down(&self, opts: &DownOptions) -> Result<()>;

    fn restart(&self, services: &[String]) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Argument vectors
// ---------------------------------------------------------------------------

fn push_env_flags(args: &mut Vec<String>, env: &[(String, String)]) {
    for (key, _) in env {
        args.push("--env".to_string());
        args.push(key.clone());
    }
}

pub fn exec_args(exec: &Exec) -> Vec<String> {
    let mut args = vec!["compose".to_string(), "exec".to_string(), "-T".to_string()];
    if let Some(dir) = &exec.workdir {
        args.push("--workdir".to_string());
        args.push(dir.clone());
    }
    push_env_flags(&mut args, &exec.env);
    args.push(exec.service.clone());
    args.extend(exec.argv.iter().cloned());
    args
}

pub fn run_args(exec: &Exec) -> Vec<String> {
    let mut args: Vec<String> = ["compose", "run", "--build", "--rm", "-T"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if let Some(dir) = &exec.workdir {
        args.push("--workdir".to_string());
        args.push(dir.clone());
    }
    push_env_flags(&mut args, &exec.env);
    args.push(exec.service.clone());
    args.extend(exec.argv.iter().cloned());
    args
}

pub fn up_args(opts: &UpOptions, services: &[String]) -> Vec<String> {
    let mut args: Vec<String> = ["compose", "up", "--detach", "--wait"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if opts.build {
        args.push("--build".to_string());
        args.push("--renew-anon-volumes".to_string());
    }
    // Always recreate so containers pick up the latest compose file, and drop
    // containers of services that were removed from it.
    args.push("--force-recreate".to_string());
    args.push("--remove-orphans".to_string());
    args.extend(services.iter().cloned());
    args
}

pub fn down_args(opts: &DownOptions) -> Vec<String> {
    let mut args = vec!["compose".to_string(), "down".to_string()];
    if opts.remove_images {
        args.push("--rmi".to_string());
        args.push("all".to_string());
    }
    if opts.remove_volumes {
        args.push("--volumes".to_string());
    }
    args
}

pub fn restart_args(services: &[String]) -> Vec<String> {
    let mut args = vec!["compose".to_string(), "restart".to_string()];
    args.extend(services.iter().cloned());
    args
}

pub fn ps_args() -> Vec<String> {
    ["compose", "ps", "--services", "--status", "running"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// DockerCompose
// ---------------------------------------------------------------------------

/// [`ServiceRunner`] backed by the `docker compose` CLI, run from the
/// project root so the compose file and `.env` are picked up.
///
/// The `docker` binary is looked up on first use, so callers can validate
/// their input before a missing tool is reported.
#[derive(Debug, Clone)]
pub struct DockerCompose {
    root: PathBuf,
    program: OnceLock<PathBuf>,
}

impl DockerCompose {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            program: OnceLock::new(),
        }
    }

    fn program(&self) -> Result<&Path> {
        if let Some(program) = self.program.get() {
            return Ok(program);
        }
        let found =
            which::which("docker").map_err(|_| WpdevError::ToolNotFound("docker".to_string()))?;
        Ok(self.program.get_or_init(|| found))
    }

    fn invoke(
        &self,
        args: &[String],
        env: &[(String, String)],
        stdin: Option<&[u8]>,
        capture: bool,
        check: bool,
    ) -> Result<CommandResult> {
        let command_line = format!("docker {}", args.join(" "));
        tracing::debug!(command = %command_line, "running");

        let mut cmd = Command::new(self.program()?);
        cmd.args(args).current_dir(&self.root);
        cmd.envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        if stdin.is_some() {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }
        if capture {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let spawn_err = |source: std::io::Error| WpdevError::Spawn {
            command: command_line.clone(),
            source,
        };

        let mut child = cmd.spawn().map_err(spawn_err)?;
        if let Some(input) = stdin {
            if let Some(pipe) = child.stdin.as_mut() {
                pipe.write_all(input).map_err(spawn_err)?;
            }
        }
        let output = child.wait_with_output().map_err(spawn_err)?;

        let result = CommandResult {
            // Killed by a signal: no code, report a generic failure.
            exit_code: output.status.code().unwrap_or(1),
            stdout: capture.then_some(output.stdout),
            stderr: capture.then(|| String::from_utf8_lossy(&output.stderr).into_owned()),
        };

        if check && !result.succeeded() {
            return Err(WpdevError::CommandFailed {
                command: command_line,
                code: result.exit_code,
            });
        }
        Ok(result)
    }
}

impl ServiceRunner for DockerCompose {
    fn exec(&self, exec: &Exec) -> Result<CommandResult> {
        self.invoke(
            &exec_args(exec),
            &exec.env,
            exec.stdin.as_deref(),
            exec.capture,
            exec.check,
        )
    }

    fn run_ephemeral(&self, exec: &Exec) -> Result<CommandResult> {
        self.invoke(
            &run_args(exec),
            &exec.env,
            exec.stdin.as_deref(),
            exec.capture,
            exec.check,
        )
    }

    fn running_services(&self) -> Result<Vec<String>> {
        let result = self.invoke(&ps_args(), &[], None, true, true)?;
        Ok(result
            .stdout_text()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn up(&self, opts: &UpOptions, services: &[String]) -> Result<()> {
        self.invoke(&up_args(opts, services), &[], None, false, true)?;
        Ok(())
    }

    fn down(&self, opts: &DownOptions) -> Result<()> {
        self.invoke(&down_args(opts), &[], None, false, true)?;
        Ok(())
    }

    fn restart(&self, services: &[String]) -> Result<()> {
        self.invoke(&restart_args(services), &[], None, false, true)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(items: &[&str]) -> Vec<String> {
        items.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn exec_args_keep_secret_values_off_the_command_line() {
        let exec = Exec::new("db", ["mysql", "-uwordpress"])
            .env("MYSQL_PWD", "hunter2")
            .stdin("SELECT 1;");
        let args = exec_args(&exec);
        assert_eq!(
            args,
            s(&["compose", "exec", "-T", "--env", "MYSQL_PWD", "db", "mysql", "-uwordpress"])
        );
        assert!(!args.iter().any(|a| a.contains("hunter2")));
    }

    #[test]
    fn exec_args_with_workdir() {
        let exec = Exec::new("wp61-php74", ["vendor/bin/phpunit"]).workdir("/plugin");
        assert_eq!(
            exec_args(&exec),
            s(&["compose", "exec", "-T", "--workdir", "/plugin", "wp61-php74", "vendor/bin/phpunit"])
        );
    }

    #[test]
    fn run_args_build_and_remove() {
        let exec = Exec::new("composer", ["composer", "install"]).env("COMPOSER_AUTH", "{}");
        assert_eq!(
            run_args(&exec),
            s(&[
                "compose", "run", "--build", "--rm", "-T", "--env", "COMPOSER_AUTH", "composer",
                "composer", "install"
            ])
        );
    }

    #[test]
    fn up_args_without_build() {
        let args = up_args(&UpOptions::default(), &s(&["svc-a"]));
        assert_eq!(
            args,
            s(&[
                "compose",
                "up",
                "--detach",
                "--wait",
                "--force-recreate",
                "--remove-orphans",
                "svc-a"
            ])
        );
    }

    #[test]
    fn up_args_with_build_renews_volumes() {
        let args = up_args(&UpOptions { build: true }, &s(&["a", "b"]));
        assert!(args.contains(&"--build".to_string()));
        assert!(args.contains(&"--renew-anon-volumes".to_string()));
        assert_eq!(&args[args.len() - 2..], &s(&["a", "b"])[..]);
    }

    #[test]
    fn down_args_nuke() {
        assert_eq!(down_args(&DownOptions::default()), s(&["compose", "down"]));
        let nuke = DownOptions {
            remove_images: true,
            remove_volumes: true,
        };
        assert_eq!(
            down_args(&nuke),
            s(&["compose", "down", "--rmi", "all", "--volumes"])
        );
    }

    #[test]
    fn exec_defaults_to_checked_streaming() {
        let exec = Exec::new("wp", ["wp", "core", "is-installed"]);
        assert!(exec.check);
        assert!(!exec.capture);
        assert!(!exec.tolerate_failure().check);
    }

    #[test]
    fn command_result_success() {
        assert!(CommandResult::success().succeeded());
        let failed = CommandResult {
            exit_code: 1,
            ..CommandResult::default()
        };
        assert!(!failed.succeeded());
    }

    // Host shell stands in for the docker binary so the process plumbing
    // runs for real.
    #[cfg(unix)]
    fn shell_runner(root: &Path) -> DockerCompose {
        DockerCompose {
            root: root.to_path_buf(),
            program: OnceLock::from(PathBuf::from("sh")),
        }
    }

    #[cfg(unix)]
    #[test]
    fn captured_stdout_keeps_non_utf8_bytes() {
        let dir = tempfile::TempDir::new().unwrap();
        let runner = shell_runner(dir.path());
        let result = runner
            .invoke(&s(&["-c", r"printf 'caf\351'"]), &[], None, true, true)
            .unwrap();
        assert_eq!(result.stdout.as_deref(), Some(&b"caf\xe9"[..]));
    }

    #[cfg(unix)]
    #[test]
    fn stdin_bytes_reach_the_child_unchanged() {
        let dir = tempfile::TempDir::new().unwrap();
        let runner = shell_runner(dir.path());
        let input: &[u8] = b"INSERT VALUES ('caf\xe9');\n";
        let result = runner
            .invoke(&s(&["-c", "cat"]), &[], Some(input), true, true)
            .unwrap();
        assert_eq!(result.stdout.as_deref(), Some(input));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_becomes_command_failed() {
        let dir = tempfile::TempDir::new().unwrap();
        let runner = shell_runner(dir.path());
        let err = runner
            .invoke(&s(&["-c", "exit 3"]), &[], None, false, true)
            .unwrap_err();
        match err {
            WpdevError::CommandFailed { command, code } => {
                assert_eq!(code, 3);
                assert_eq!(command, "docker -c exit 3");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let tolerated = runner
            .invoke(&s(&["-c", "exit 3"]), &[], None, false, false)
            .unwrap();
        assert_eq!(tolerated.exit_code, 3);
    }

    #[test]
    fn stdout_text_decodes_captured_output() {
        let result = CommandResult {
            stdout: Some(b"db\nwp61-php74\n".to_vec()),
            ..CommandResult::default()
        };
        assert_eq!(result.stdout_text(), "db\nwp61-php74\n");
        assert_eq!(CommandResult::success().stdout_text(), "");
    }
}
