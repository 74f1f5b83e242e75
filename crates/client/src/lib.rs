//! Network transport for offcache.
//!
//! This crate provides the outbound boundary the strategy engine calls
//! into: a [`Transport`] trait plus the reqwest-backed [`HttpTransport`].

pub mod transport;

pub use transport::{FetchedResponse, HttpTransport, Transport, TransportConfig};
