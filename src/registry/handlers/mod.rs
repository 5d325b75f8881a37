pub mod command;
pub mod common;
pub mod composite;
pub mod eval;
pub mod frontmatter;
pub mod open;
pub mod open_block;
pub mod plugin;
pub mod write;
