pub mod config;
pub mod error;
pub mod model;
pub mod router;

pub use config::RoutingConfig;
pub use error::{CoreError, Result};
pub use model::*;
pub use router::IntelligentRouter;
