//! Pairup: a recurring pairing reward loop for chat communities.
//!
//! A member opens an invitation; the first eligible recently-active member
//! to accept pairs with them, both earn one unit of currency, and the pair
//! is locked out from pairing again until the next periodic reset.
//!
//! # Architecture
//!
//! The core is built from small components wired together by [`runtime`]:
//! - **Activity tracking**: [`activity::ActivitySet`] remembers who is
//!   recently active, with lazy expiry
//! - **Reset clock**: [`resets`] computes anchor-phase-locked cycle
//!   boundaries; [`scheduler::ResetScheduler`] fires announcements at them
//! - **Ledger**: [`ledger::Ledger`] owns balances and per-cycle pairing
//!   history, persisted through an injected [`storage::AccountStore`]
//! - **Pairing**: [`pairing::PairingService`] arbitrates one invitation's
//!   accept/reject/timeout lifecycle
//!
//! The chat platform itself is behind the [`gateway::PairingGateway`]
//! trait; rendering, command registration, and connection management live
//! in the glue that implements it.

pub mod activity;
pub mod config;
pub mod error;
pub mod gateway;
pub mod leaderboard;
pub mod ledger;
pub mod pairing;
pub mod resets;
pub mod runtime;
pub mod scheduler;
pub mod storage;
pub mod text;

pub use config::PairupConfig;
pub use error::{PairError, Result};
pub use gateway::PairingGateway;
pub use ledger::{Account, Ledger};
pub use pairing::{InviteOutcome, PairingService};
pub use runtime::RuntimeEvent;
