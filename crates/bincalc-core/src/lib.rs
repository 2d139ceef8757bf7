//! Hardware-independent core library for bincalc
//!
//! This crate contains all platform-agnostic logic for the eight-switch
//! binary calculator: switch sampling, value conversion, the display layouts
//! and refresh loop, the minimal HTTP request handler and server loop, and the
//! DHCP responder used by the access point.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32) and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod app_state;
pub mod codec;
pub mod config;
pub mod dhcp;
pub mod display;
pub mod http;
pub mod server;
pub mod switches;

#[cfg(test)]
pub(crate) mod test_support;
