// ABOUTME: Library crate for the webssh terminal client
// Exposes the session transport, the session registry and the TUI pieces for testing and embedding

pub mod app;
pub mod cli;
pub mod components;
pub mod config;
pub mod session;
pub mod timer;
pub mod transport;
