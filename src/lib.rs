//! Pathprobe - UDP path quality measurement tool
//!
//! This library measures loss, round-trip latency, jitter and (optionally)
//! server-side processing time between a client and a UDP echo server.
//! The client streams sequence-numbered probes at a controlled rate while a
//! concurrent receiver matches echoes back to their sends.

pub mod client;
pub mod protocol;
pub mod server;
