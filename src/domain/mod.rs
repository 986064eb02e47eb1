pub mod ledger;
pub mod settlement;
pub mod trade;
pub mod window;

pub use ledger::*;
pub use settlement::*;
pub use trade::*;
pub use window::*;
