pub mod bootstrap;
pub mod dto;
pub mod error;
pub mod logging;
pub mod routes;

pub use bootstrap::EngineState;
pub use routes::{auth_router, tally_router};
