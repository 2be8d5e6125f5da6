//! A single-node proof-of-work ledger.
//!
//! - [`blockchain`] - transactions, blocks, the ledger state machine and its storage seam
//! - [`config`] - TOML and environment configuration
//! - [`api`] - actix-web routes over the ledger

pub mod api;
pub mod blockchain;
pub mod config;
