//! CLI subcommands

pub mod award;
pub mod bounty;
pub mod complete;
pub mod create;
pub mod delete;
pub mod entries;
pub mod files;
pub mod pledge;
pub mod submit;
