//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod cat;
pub mod init;
pub mod view;
