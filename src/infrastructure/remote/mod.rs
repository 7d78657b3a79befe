//! Remote tracker adapter.

pub mod client;

pub use client::RemoteClient;
