//! Core business logic for Velora.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, decision rules, and calculations live here.
//!
//! # Modules
//!
//! - `credits` - Credit pool arithmetic, tier allocations, deduction splits
//! - `compliance` - Send-eligibility decisions, quiet hours, opt-out policy
//! - `notify` - Notification job definitions and message templating

pub mod compliance;
pub mod credits;
pub mod notify;
