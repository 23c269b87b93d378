//! Knowledge-base build client.

pub mod client;

pub use client::QnaBuildClient;
