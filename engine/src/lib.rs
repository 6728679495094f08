//! Highrise engine.
//!
//! This crate contains the bonus-program state machine: user registry,
//! capped bonus ledger, daily cooldown gate, promo-code redemption, and
//! the daily activity recorder, all executing against an embedded SQLite
//! store.
//!
//! ## Determinism requirements
//! - Do not read wall-clock time inside the engine; every time-sensitive
//!   operation takes `now` as a parameter supplied by the caller.
//! - Do not use ambient randomness for anything but promo-code drawing;
//!   code uniqueness is enforced by the store, not by the generator.
//!
//! ## Concurrency invariants
//! All balance-mutating operations for one user (`save_game_result`,
//! `exchange_bonuses`, `create_promo_code`, `start_bonus_attempt`) are
//! serialized through a per-user lock held for the full read-modify-write.
//! Multi-statement updates run inside one transaction and roll back as a
//! unit. Reads (eligibility, stats, sweep queries) never take locks and
//! never mutate state.
//!
//! The primary entrypoint is [`Engine`].

mod activity;
mod ads;
mod cooldown;
mod engine;
mod error;
mod ledger;
mod locks;
mod redemption;
mod registry;
mod stats;
mod store;


pub use ads::AdTargeting;
pub use engine::Engine;
pub use error::EngineError;
pub use store::open_pool;
