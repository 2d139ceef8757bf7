//! Deployment selected at compile time
//!
//! The profile comes from the `profile-*` Cargo features and the access point
//! credentials from the build script.

use bincalc_core::config::Deployment;

#[cfg(feature = "profile-classic")]
const PROFILE: Deployment = bincalc_core::config::CLASSIC;

#[cfg(all(feature = "profile-decimal", not(feature = "profile-classic")))]
const PROFILE: Deployment = bincalc_core::config::DECIMAL;

#[cfg(not(any(feature = "profile-decimal", feature = "profile-classic")))]
const PROFILE: Deployment = bincalc_core::config::HEX;

const AP_SSID: &str = env!("BINCALC_AP_SSID");
const AP_PASSWORD: &str = env!("BINCALC_AP_PASSWORD");

pub static DEPLOYMENT: Deployment = PROFILE.with_credentials(AP_SSID, AP_PASSWORD);
