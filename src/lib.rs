pub mod editing;
pub mod error;
pub mod events;
pub mod host;
pub mod identity;
pub mod index;
pub mod metadata;
pub mod navigation;
pub mod paths;
pub mod persist;
pub mod registry;
pub mod resolver;
pub mod settings;
pub mod settle;
pub mod state;
pub mod uri;
