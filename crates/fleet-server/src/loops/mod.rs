//! Background loops.

pub mod persist_loop;
