pub mod config;
pub mod error;
pub mod types;

pub use config::{ChatConfig, GeneralConfig, MailgraphConfig, SchemaConfig};
pub use error::{MailgraphError, Result};
pub use types::*;
