pub mod config;
pub mod db;
pub mod deps;
pub mod error;
pub mod fixtures;
pub mod io;
pub mod orchestrator;
pub mod paths;
pub mod provision;
pub mod readiness;
pub mod runner;
pub mod secrets;
pub mod wp;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, WpdevError};
