//! Marcador domain types.
//!
//! Defines the wallet ledger, betting and withdrawal entities, the VIP/referral tier
//! calculators, storage keys/values and change notifications shared by the execution
//! engine and the server.

mod betting;
mod codec;
mod constants;
mod ledger;
mod notify;
mod state;
mod tiers;

pub use betting::*;
pub use codec::*;
pub use constants::*;
pub use ledger::*;
pub use notify::*;
pub use state::*;
pub use tiers::*;
