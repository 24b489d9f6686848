//! tailgate - fleet access-log aggregator with a pollable hits endpoint
//!
//! Tails HTTP access logs on a fleet of remote hosts over ssh, parses and
//! normalizes each line into a hit, and keeps the last few seconds of
//! activity in one in-process sliding window. Dashboards poll a single
//! endpoint and receive only the hits that arrived since their last poll.
//!
//! # Architecture
//!
//! ```text
//! ssh tail -f (per host) ──► IngestWorker ──► SlidingBuffer ◄── GET /?since=...
//!                            parse+normalize
//! ```
//!
//! Workers fail independently; a dead connection ends that host's
//! contribution and nothing else.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod buffer;
pub mod config;
pub mod error;
pub mod hit;
pub mod metrics;
pub mod normalize;
pub mod parser;
pub mod server;
pub mod source;
pub mod worker;

pub use config::Config;
pub use error::{Result, TailgateError};
pub use hit::Hit;
