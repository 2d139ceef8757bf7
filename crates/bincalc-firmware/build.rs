//! Link script selection and build-time access point credentials
//!
//! Credentials come from the environment or a `.env` file next to the
//! manifest (`BINCALC_AP_SSID`, `BINCALC_AP_PASSWORD`). When unset, the
//! selected profile's own credentials are used.

use std::env;

const SSID_KEY: &str = "BINCALC_AP_SSID";
const PASSWORD_KEY: &str = "BINCALC_AP_PASSWORD";

fn main() {
    println!("cargo:rustc-link-arg=-Tlinkall.x");

    println!("cargo:rerun-if-changed=.env");
    println!("cargo:rerun-if-env-changed={SSID_KEY}");
    println!("cargo:rerun-if-env-changed={PASSWORD_KEY}");
    let _ = dotenvy::dotenv();

    let (default_ssid, default_password) = if env::var_os("CARGO_FEATURE_PROFILE_CLASSIC").is_some() {
        ("BinaryCalc", "12345678")
    } else {
        ("GenGodCalc", "BinaryRulz")
    };

    let ssid = env::var(SSID_KEY).unwrap_or_else(|_| default_ssid.to_owned());
    let password = env::var(PASSWORD_KEY).unwrap_or_else(|_| default_password.to_owned());

    if ssid.is_empty() || ssid.len() > 32 {
        panic!("{SSID_KEY} must be 1 to 32 bytes");
    }
    if password.len() < 8 || password.len() > 63 {
        panic!("{PASSWORD_KEY} must be 8 to 63 characters for WPA2");
    }

    println!("cargo:rustc-env={SSID_KEY}={ssid}");
    println!("cargo:rustc-env={PASSWORD_KEY}={password}");
}
