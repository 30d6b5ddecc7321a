//! CLI module for Reshelf
//!
//! Every command works on a plain directory tree, so no host editor is
//! needed to reorganize exported content.

pub mod config;
pub mod error;
pub mod output;
pub mod reconcile;
pub mod rules;
