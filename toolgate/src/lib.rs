//! Workspace-confined tools for an autonomous coding agent.
//!
//! Six operations (read, write, list, search, run, schema introspection) are
//! exposed over one workspace root. Every path is canonicalized and checked
//! against that root before any I/O, writes leave a backup of the previous
//! version, and shell commands pass an allow-list and a deny-list before they
//! are spawned.
//!
//! - **[`core`]**: Pure logic (command gating, block extraction, text shaping).
//!   No I/O.
//! - **[`io`]**: Side effects (path resolution, traversal, backups, processes,
//!   configuration).
//! - **[`tools`]**: One module per tool plus the [`tools::Toolbox`] dispatcher.
//!
//! [`catalog`] describes the tools with JSON Schemas and [`serve`] exposes them
//! over a JSON-lines stdio loop.

pub mod catalog;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod serve;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
