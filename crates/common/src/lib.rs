pub mod config;
pub mod error;
pub mod gateway;
pub mod notifier;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use gateway::MarketDataGateway;
pub use notifier::Notifier;
pub use types::*;
