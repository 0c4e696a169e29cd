//! In-memory [`ServiceRunner`] used by the unit tests.
//!
//! It records every call and models just enough of the database server and
//! the WordPress installs for the provisioning logic to be observable:
//! databases are created and dropped by the SQL piped to the `db` service,
//! `wp core install` marks the service's database as installed, and
//! `wp core is-installed` reports that flag through its exit code.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::db::DB_SERVICE;
use crate::error::{Result, WpdevError};
use crate::runner::{CommandResult, DownOptions, Exec, ServiceRunner, UpOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Up { services: Vec<String>, build: bool },
    Down(DownOptions),
    Restart(Vec<String>),
    Exec(Exec),
    Ephemeral(Exec),
    Ps,
}

#[derive(Default)]
struct State {
    databases: HashSet<String>,
    installed: HashSet<String>,
    running: Vec<String>,
    fail_on: Vec<String>,
    stdout: Vec<(String, Vec<u8>)>,
}

pub struct FakeRunner {
    db_of: HashMap<String, String>,
    calls: RefCell<Vec<Call>>,
    state: RefCell<State>,
}

impl FakeRunner {
    /// `services` maps each WordPress service to its database name.
    pub fn new(services: &[(&str, &str)]) -> Self {
        Self {
            db_of: services
                .iter()
                .map(|(s, d)| (s.to_string(), d.to_string()))
                .collect(),
            calls: RefCell::new(Vec::new()),
            state: RefCell::new(State::default()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Every exec/run issued so far, in order.
    pub fn execs(&self) -> Vec<Exec> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Exec(e) | Call::Ephemeral(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    /// Commands as single lines (`service: argv...`), with piped SQL appended.
    pub fn command_lines(&self) -> Vec<String> {
        self.execs()
            .iter()
            .map(|e| match &e.stdin {
                Some(input) => format!(
                    "{}: {} <<< {}",
                    e.service,
                    e.argv.join(" "),
                    String::from_utf8_lossy(input).trim()
                ),
                None => format!("{}: {}", e.service, e.argv.join(" ")),
            })
            .collect()
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|l| l.contains(needle))
            .count()
    }

    pub fn database_exists(&self, name: &str) -> bool {
        self.state.borrow().databases.contains(name)
    }

    pub fn set_running(&self, services: &[&str]) {
        self.state.borrow_mut().running = services.iter().map(|s| s.to_string()).collect();
    }

    /// Any command whose argv contains `needle` exits with code 1.
    pub fn fail_on(&self, needle: &str) {
        self.state.borrow_mut().fail_on.push(needle.to_string());
    }

    /// Captured stdout returned for commands whose argv contains `needle`.
    pub fn set_stdout(&self, needle: &str, stdout: impl AsRef<[u8]>) {
        self.state
            .borrow_mut()
            .stdout
            .push((needle.to_string(), stdout.as_ref().to_vec()));
    }

    fn simulate(&self, exec: &Exec) -> Result<CommandResult> {
        let line = exec.argv.join(" ");
        let mut state = self.state.borrow_mut();
        let mut exit_code = 0;

        if state.fail_on.iter().any(|n| line.contains(n.as_str())) {
            exit_code = 1;
        } else if exec.service == DB_SERVICE {
            if let Some(input) = &exec.stdin {
                let sql = String::from_utf8_lossy(input);
                for stmt in sql.split(';').map(str::trim) {
                    if let Some(db) = stmt.strip_prefix("DROP DATABASE IF EXISTS ") {
                        state.databases.remove(db.trim());
                        state.installed.remove(db.trim());
                    } else if let Some(db) = stmt.strip_prefix("CREATE DATABASE IF NOT EXISTS ") {
                        state.databases.insert(db.trim().to_string());
                    }
                }
            }
        } else if let Some(db) = self.db_of.get(&exec.service) {
            if line.contains("core is-installed") {
                if !state.installed.contains(db) {
                    exit_code = 1;
                }
            } else if line.contains("core install") {
                if state.databases.contains(db) {
                    state.installed.insert(db.clone());
                } else {
                    exit_code = 1;
                }
            }
        }

        let stdout = if exec.capture {
            Some(
                state
                    .stdout
                    .iter()
                    .find(|(n, _)| line.contains(n.as_str()))
                    .map(|(_, out)| out.clone())
                    .unwrap_or_default(),
            )
        } else {
            None
        };

        if exec.check && exit_code != 0 {
            return Err(WpdevError::CommandFailed {
                command: format!("{}: {}", exec.service, line),
                code: exit_code,
            });
        }
        Ok(CommandResult {
            exit_code,
            stdout,
            stderr: exec.capture.then(String::new),
        })
    }
}

impl ServiceRunner for FakeRunner {
    fn exec(&self, exec: &Exec) -> Result<CommandResult> {
        self.calls.borrow_mut().push(Call::Exec(exec.clone()));
        self.simulate(exec)
    }

    fn run_ephemeral(&self, exec: &Exec) -> Result<CommandResult> {
        self.calls.borrow_mut().push(Call::Ephemeral(exec.clone()));
        self.simulate(exec)
    }

    fn running_services(&self) -> Result<Vec<String>> {
        self.calls.borrow_mut().push(Call::Ps);
        Ok(self.state.borrow().running.clone())
    }

    fn up(&self, opts: &UpOptions, services: &[String]) -> Result<()> {
        self.calls.borrow_mut().push(Call::Up {
            services: services.to_vec(),
            build: opts.build,
        });
        let mut state = self.state.borrow_mut();
        for s in services {
            if !state.running.contains(s) {
                state.running.push(s.clone());
            }
        }
        Ok(())
    }

    fn down(&self, opts: &DownOptions) -> Result<()> {
        self.calls.borrow_mut().push(Call::Down(*opts));
        let mut state = self.state.borrow_mut();
        state.running.clear();
        if opts.remove_volumes {
            state.databases.clear();
            state.installed.clear();
        }
        Ok(())
    }

    fn restart(&self, services: &[String]) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(Call::Restart(services.to_vec()));
        Ok(())
    }
}
