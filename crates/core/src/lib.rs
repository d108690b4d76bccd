//! Core business logic for Tally.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All wallet domain types, validation rules, and balance calculations live here.
//!
//! # Modules
//!
//! - `wallet` - Prepaid wallet ledger: executor math, lifecycle, settlement, auto top-up

pub mod wallet;
