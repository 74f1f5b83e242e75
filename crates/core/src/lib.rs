//! Core types and shared functionality for offcache.
//!
//! This crate provides:
//! - Partitioned snapshot store with SQLite backend
//! - Unified error types
//! - Request descriptor shared by classifier and transport
//! - Layered configuration

pub mod config;
pub mod error;
pub mod request;
pub mod store;

pub use config::AppConfig;
pub use error::Error;
pub use request::{Destination, RequestDescriptor};
pub use store::{PartitionHandle, ResponseSnapshot, StoreDb};
