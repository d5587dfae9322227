//! Shared plumbing for the `gvm` command line tools.

pub mod cli;
pub mod logging;
