//! I/O helpers for the tools.

pub mod backup;
pub mod config;
pub mod process;
pub mod walk;
pub mod workspace;
