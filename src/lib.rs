//! Bounty Board - Award bounty pledges to winning entries
//!
//! Users post bounties and pledge funds to them. Creators submit entries,
//! and each benefactor awards its pledge to one entry.
//!
//! # How it works
//!
//! 1. A bounty is created together with its creator's pledge
//! 2. Other users pledge (benefactors); BUZZ pledges move into the system account
//! 3. Creators submit entries with files and preview images
//! 4. Each benefactor awards one entry; BUZZ is paid from the system account
//!    to the entry owner through the payment ledger
//! 5. Once every benefactor has awarded, the bounty is complete
//!
//! # Guarantees
//!
//! - A benefactor awards at most once and the award is never reassigned
//! - Completion is one-way
//! - Entries that received awards cannot be deleted
//! - Gated files only reveal their URL once the entry's awarded total
//!   reaches the unlock amount

pub mod auth;
pub mod awards;
pub mod board;
pub mod bounties;
pub mod config;
pub mod db;
pub mod entries;
pub mod error;
pub mod files;
pub mod ledger;
pub mod migrations;
pub mod models;
pub mod server;

#[cfg(test)]
mod testing;

pub use board::BountyBoard;
pub use config::Config;
pub use db::{Database, UnitOfWork};
pub use error::BountyError;
pub use ledger::{HttpLedger, MemoryLedger, PaymentLedger, SYSTEM_ACCOUNT_ID};
