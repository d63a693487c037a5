pub mod ledger;

pub use ledger::{LedgerService, PlayerView};
