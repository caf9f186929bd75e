pub mod asset;
pub mod browse;
pub mod chain;
pub mod credits;
pub mod events;
pub mod purchase;
pub mod trade;
pub mod wallet;

pub use asset::*;
pub use browse::*;
pub use chain::*;
pub use credits::*;
pub use events::*;
pub use purchase::*;
pub use trade::*;
pub use wallet::*;
