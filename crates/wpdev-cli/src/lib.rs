//! Host-side helpers for the `wpdev` binary.

pub mod env_file;
pub mod output;
pub mod root;
