//! ESP32 firmware-specific modules for bincalc
//!
//! This crate contains the hardware-specific code that cannot compile on
//! desktop targets: GPIO and I2C bring-up, the Wi-Fi access point with its
//! network stack tasks, and the compiled-in deployment selection.

#![no_std]

extern crate alloc;

pub mod app_state;
pub mod deployment;
pub mod network;
