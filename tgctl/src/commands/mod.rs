//! Command implementations for tgctl

pub mod chat;
pub mod health;
pub mod transaction;
