//! Utility modules shared by the harness and the CLI.

pub mod exec;
pub mod html;
