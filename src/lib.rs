//! Remit Onboard: conversational onboarding for a payments API.

pub mod catalog;
pub mod config;
pub mod conversation;
pub mod error;
pub mod intent;
pub mod payments;
pub mod server;
pub mod session;
