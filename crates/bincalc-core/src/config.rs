//! Compiled-in deployment profiles
//!
//! Every tunable of the device lives here as a `const`. The three profiles
//! reproduce the three board revisions that have been built: they differ in
//! switch wiring, whether hexadecimal is shown, the display layout and the
//! style of the web page.

use core::net::Ipv4Addr;

use crate::display::DisplayLayout;
use crate::http::PageStyle;
use crate::switches::{BitOrder, LinePull, Polarity, SwitchConfig};

/// Credentials and addressing of the access point the device originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPointConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
    pub address: Ipv4Addr,
    pub prefix_len: u8,
}

impl AccessPointConfig<'_> {
    /// Subnet mask matching `prefix_len`.
    pub fn netmask(&self) -> Ipv4Addr {
        let bits = u32::MAX
            .checked_shl(32 - u32::from(self.prefix_len.min(32)))
            .unwrap_or(0);
        Ipv4Addr::from(bits)
    }
}

/// Everything that differs between builds of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub name: &'static str,
    pub switches: SwitchConfig,
    /// Report hexadecimal in the JSON snapshot.
    pub include_hex: bool,
    pub layout: DisplayLayout,
    pub page: PageStyle,
    pub access_point: AccessPointConfig<'static>,
    pub http_port: u16,
    pub refresh_interval_ms: u32,
    /// How long the address screen stays up after boot, if shown at all.
    pub boot_screen_ms: Option<u32>,
}

impl Deployment {
    /// Replace the access point credentials, keeping everything else.
    pub const fn with_credentials(mut self, ssid: &'static str, password: &'static str) -> Self {
        self.access_point.ssid = ssid;
        self.access_point.password = password;
        self
    }
}

pub const DEFAULT_HTTP_PORT: u16 = 80;
pub const DEFAULT_REFRESH_INTERVAL_MS: u32 = 150;
pub const BOOT_SCREEN_MS: u32 = 3000;
pub const ACCESS_POINT_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

const GEN_GOD_AP: AccessPointConfig<'static> = AccessPointConfig {
    ssid: "GenGodCalc",
    password: "BinaryRulz",
    address: ACCESS_POINT_ADDRESS,
    prefix_len: 24,
};

/// External pulldowns, switches drive the line high, hexadecimal everywhere.
pub const HEX: Deployment = Deployment {
    name: "hex",
    switches: SwitchConfig::new(Polarity::ActiveHigh, BitOrder::AsWired, LinePull::None),
    include_hex: true,
    layout: DisplayLayout::Compact,
    page: PageStyle::Polling,
    access_point: GEN_GOD_AP,
    http_port: DEFAULT_HTTP_PORT,
    refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
    boot_screen_ms: Some(BOOT_SCREEN_MS),
};

/// Internal pulldowns with inverted reading, decimal only.
pub const DECIMAL: Deployment = Deployment {
    name: "decimal",
    switches: SwitchConfig::new(Polarity::ActiveLow, BitOrder::AsWired, LinePull::Down),
    include_hex: false,
    layout: DisplayLayout::Stacked,
    page: PageStyle::Polling,
    access_point: GEN_GOD_AP,
    http_port: DEFAULT_HTTP_PORT,
    refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
    boot_screen_ms: Some(BOOT_SCREEN_MS),
};

/// First board: pullups, switches short to ground, last wired switch is the MSB.
pub const CLASSIC: Deployment = Deployment {
    name: "classic",
    switches: SwitchConfig::new(Polarity::ActiveLow, BitOrder::Reversed, LinePull::Up),
    include_hex: false,
    layout: DisplayLayout::Stacked,
    page: PageStyle::Rendered,
    access_point: AccessPointConfig {
        ssid: "BinaryCalc",
        password: "12345678",
        address: ACCESS_POINT_ADDRESS,
        prefix_len: 24,
    },
    http_port: DEFAULT_HTTP_PORT,
    refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
    boot_screen_ms: None,
};
