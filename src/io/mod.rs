//! Input/Output handling for the command-line tool.
//!
//! This module provides consistent exit codes for scripts driving `semsql`.

pub mod exit_code;

pub use exit_code::ExitCode;
