//! # Service Layer
//!
//! The engine façade and the master server contract it logs in through.

pub mod client;
pub mod master;

pub use client::ChatClient;
pub use master::{MasterServer, RetryPolicy};
