//! Simulated vehicle movement and the HTTP client that reports it.

mod client;
mod paths;

pub use client::{BatchSummary, EventSummary, FleetClient};
pub use paths::{sample_at, LinearPath, TrackPath};
