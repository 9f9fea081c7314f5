//! HTTP request handlers for Tollgate

pub mod chat;
pub mod health;
pub mod transaction;
