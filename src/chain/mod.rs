//! Filter chains and the settings documents that drive them.

pub mod settings;
pub mod structure;

pub use settings::{FilterSettings, SettingsEntry, SettingsFormat};
pub use structure::{ChainChange, FilterChain};
