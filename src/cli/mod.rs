//! Terminal front-end for bgremove-pro
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;
mod render;
mod shell;

pub use main_impl::{main, Cli, CliLogFormat};
