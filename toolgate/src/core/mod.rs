//! Pure helpers shared by the tools: command policy, block extraction, text
//! shaping and value types. Nothing in here touches the filesystem or spawns
//! processes.

pub mod blocks;
pub mod policy;
pub mod text;
pub mod types;
