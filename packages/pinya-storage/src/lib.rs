pub mod aliases;
pub mod db;
pub mod gaps;
pub mod knowledge;
pub mod models;
pub mod schema;
pub mod settings;
pub mod vector;
pub mod votes;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
