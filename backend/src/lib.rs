pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod retry;
pub mod services;
pub mod store;

pub use error::LedgerError;
pub use handlers::{create_router, AppState};
pub use services::{LedgerService, PlayerView};
