//! Hardware initialization for the calculator board
//!
//! Sets up the eight switch inputs and the SSD1306 display on I2C0.

use bincalc_core::app_state::AppError;
use bincalc_core::switches::{InputLine, LinePull, SWITCH_COUNT, SwitchBank, SwitchConfig};
use esp_hal::Blocking;
use esp_hal::gpio::{AnyPin, Input, InputConfig, Pull};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::time::Rate;
use log::info;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::{I2CDisplayInterface, Ssd1306};

/// One switch input line.
pub struct SwitchPin(Input<'static>);

impl SwitchPin {
    pub fn new(pin: AnyPin<'static>, pull: LinePull) -> Self {
        let pull = match pull {
            LinePull::None => Pull::None,
            LinePull::Up => Pull::Up,
            LinePull::Down => Pull::Down,
        };
        Self(Input::new(pin, InputConfig::default().with_pull(pull)))
    }
}

impl InputLine for SwitchPin {
    fn is_high(&self) -> bool {
        self.0.is_high()
    }
}

pub type Switches = SwitchBank<SwitchPin>;

/// Configure the switch pins in declared order.
pub fn init_switches(pins: [AnyPin<'static>; SWITCH_COUNT], config: SwitchConfig) -> Switches {
    let switches = SwitchBank::new(pins.map(|pin| SwitchPin::new(pin, config.pull)), config);
    info!("Switches ready ({:?}, {:?})", config.polarity, config.order);
    switches
}

pub type Oled = Ssd1306<
    I2CInterface<I2c<'static, Blocking>>,
    DisplaySize128x64,
    BufferedGraphicsMode<DisplaySize128x64>,
>;

/// Bring up I2C0 at 400 kHz and initialize the 128x64 SSD1306 on it.
pub fn init_display(
    i2c0: esp_hal::peripherals::I2C0<'static>,
    sda: esp_hal::peripherals::GPIO21<'static>,
    scl: esp_hal::peripherals::GPIO22<'static>,
) -> Result<Oled, AppError> {
    let i2c = I2c::new(i2c0, I2cConfig::default().with_frequency(Rate::from_khz(400)))
        .map_err(|err| AppError::display(&err))?
        .with_sda(sda)
        .with_scl(scl);

    let mut display = Ssd1306::new(
        I2CDisplayInterface::new(i2c),
        DisplaySize128x64,
        DisplayRotation::Rotate0,
    )
    .into_buffered_graphics_mode();
    display.init().map_err(|err| AppError::display(&err))?;

    info!("Display ready");
    Ok(display)
}
