//! Firmware-specific application state extensions
//!
//! Re-exports the hardware-independent app state from `bincalc_core` and
//! adds the ESP32 switch and display bring-up.

mod hardware;

pub use hardware::*;

// Re-export all shared app state types from bincalc-core
pub use bincalc_core::app_state::*;
