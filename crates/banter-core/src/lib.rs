pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::BanterConfig;
pub use error::{BanterError, Result};
pub use events::{TriggerEvent, TriggerKind};
pub use types::*;
