//! pkgtrace driver library
//!
//! Project setup and output rendering shared by the `pkgtrace` binary's
//! subcommands.

pub mod project;
pub mod report;

pub use project::{project_path_for, Project};
