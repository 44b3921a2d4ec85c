//! Marcador execution layer.
//!
//! This crate contains the wallet ledger and the bet lifecycle: placement, settlement of
//! events in normal and inverse mode, cancellation refunds and VIP-gated withdrawals. The
//! primary entrypoint is [`Engine`].
//!
//! ## Atomicity
//! Every operation stages its writes in a `Layer` and commits them as one batch through
//! [`State::apply`]. A commit first re-checks every value the operation read; if another
//! commit changed one of them in between, the operation is re-run from scratch. An error
//! anywhere before the commit drops the layer, so failed operations never leave partial
//! writes behind.
//!
//! ## Event runs
//! Settlement and cancellation record their intent on the event before touching any bet,
//! then resolve bets independently. A run that reports failures can be repeated and picks
//! up the bets still pending.
//!
//! ```rust,ignore
//! use marcador_execution::{Engine, EngineConfig, EventDraft, Memory};
//!
//! let engine = Engine::new(Memory::default(), EngineConfig::default())?;
//! let user = engine.register_user("+51999000111", None).await?;
//! engine.mint_deposit(user.id, 15_000, Some("psp:1")).await?;
//! let listing = engine.create_event(draft).await?;
//! engine.place_bet(user.id, listing.event.id, listing.options[0].id, 5_000).await?;
//! let report = engine.settle_event(listing.event.id, "2-0".parse()?).await?;
//! ```

mod config;
mod engine;
mod error;
mod layer;
mod locks;
mod state;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

#[cfg(test)]
mod placement_tests;
#[cfg(test)]
mod withdrawal_tests;

pub use config::EngineConfig;
pub use engine::{
    BetFailure, Engine, EventListing, Receipt, RefundReport, SettlementReport, WalletSummary,
};
pub use error::{Error, Missing};
pub use layer::{
    classify, profit_for, BetRefund, BetSettlement, EventDraft, Memo, OptionDraft, Outcome,
};
pub use state::{Memory, State, Status};
