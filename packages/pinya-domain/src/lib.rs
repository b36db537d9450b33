pub mod access;
pub mod aliases;
pub mod confidence;
pub mod format;
pub mod language;
pub mod retrieval;
pub mod settings;
