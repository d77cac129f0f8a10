//! Fleet CLI - device simulation tools for the fleet server.
//!
//! - send_track: drives one shipment along a path and posts batches and events

pub mod sim;
