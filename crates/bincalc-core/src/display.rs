//! Display rendering and the refresh loop
//!
//! Rendering goes through [`DisplaySink`], a full-redraw interface of
//! `clear`, `draw_text` and `present`. [`GraphicsSink`] adapts any monochrome
//! `embedded-graphics` draw target, so the SSD1306 driver and the simulator
//! window share every layout.

use core::fmt::{Debug, Write};
use core::net::Ipv4Addr;

use embedded_graphics::mono_font::{MonoTextStyle, ascii::FONT_6X10};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use embedded_hal_async::delay::DelayNs;
use log::{info, warn};

use crate::app_state::{AppContext, AppError};
use crate::codec::{ValueSnapshot, to_hex_string};
use crate::switches::BitSource;

pub const DISPLAY_WIDTH_PX: u32 = 128;
pub const DISPLAY_HEIGHT_PX: u32 = 64;

/// Minimal text surface that is fully redrawn on every refresh.
pub trait DisplaySink {
    type Error: Debug;

    fn clear(&mut self) -> Result<(), Self::Error>;

    /// Draw `text` with its top-left corner at (`x`, `y`).
    fn draw_text(&mut self, text: &str, x: i32, y: i32) -> Result<(), Self::Error>;

    /// Make everything drawn since the last `clear` visible.
    fn present(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError<D, P> {
    Draw(D),
    Present(P),
}

/// [`DisplaySink`] over a monochrome draw target.
///
/// `present` is whatever moves the frame to the glass, e.g. the driver's
/// buffer flush.
pub struct GraphicsSink<D, F> {
    target: D,
    present: F,
}

impl<D, F, P> GraphicsSink<D, F>
where
    D: DrawTarget<Color = BinaryColor>,
    F: FnMut(&mut D) -> Result<(), P>,
{
    pub fn new(target: D, present: F) -> Self {
        Self { target, present }
    }

    pub fn target(&self) -> &D {
        &self.target
    }
}

impl<D, F, P> DisplaySink for GraphicsSink<D, F>
where
    D: DrawTarget<Color = BinaryColor>,
    D::Error: Debug,
    F: FnMut(&mut D) -> Result<(), P>,
    P: Debug,
{
    type Error = SinkError<D::Error, P>;

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.target.clear(BinaryColor::Off).map_err(SinkError::Draw)
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32) -> Result<(), Self::Error> {
        let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        Text::with_baseline(text, Point::new(x, y), style, Baseline::Top)
            .draw(&mut self.target)
            .map(|_| ())
            .map_err(SinkError::Draw)
    }

    fn present(&mut self) -> Result<(), Self::Error> {
        (self.present)(&mut self.target).map_err(SinkError::Present)
    }
}

/// Arrangement of the values on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayLayout {
    /// Label and value on one row each for binary, hex and decimal.
    Compact,
    /// Binary and decimal with the value below its label.
    Stacked,
}

/// Redraw the whole screen for one snapshot.
pub fn render<S: DisplaySink + ?Sized>(
    sink: &mut S,
    layout: DisplayLayout,
    snapshot: &ValueSnapshot,
) -> Result<(), S::Error> {
    let mut decimal = heapless::String::<3>::new();
    let _ = write!(decimal, "{}", snapshot.decimal);

    sink.clear()?;
    match layout {
        DisplayLayout::Compact => {
            let hex = snapshot
                .hex
                .clone()
                .unwrap_or_else(|| to_hex_string(snapshot.decimal));
            sink.draw_text("Bin:", 0, 0)?;
            sink.draw_text(&snapshot.binary, 40, 0)?;
            sink.draw_text("Hex:", 0, 20)?;
            sink.draw_text(&hex, 40, 20)?;
            sink.draw_text("Dec:", 0, 40)?;
            sink.draw_text(&decimal, 40, 40)?;
        }
        DisplayLayout::Stacked => {
            sink.draw_text("Binary:", 0, 0)?;
            sink.draw_text(&snapshot.binary, 0, 12)?;
            sink.draw_text("Decimal:", 0, 30)?;
            sink.draw_text(&decimal, 0, 42)?;
        }
    }
    sink.present()
}

/// Screen shown once the access point is up.
pub fn render_boot_screen<S: DisplaySink + ?Sized>(
    sink: &mut S,
    address: Ipv4Addr,
) -> Result<(), S::Error> {
    let mut text = heapless::String::<15>::new();
    let _ = write!(text, "{}", address);

    sink.clear()?;
    sink.draw_text("WiFi Ready!", 0, 0)?;
    sink.draw_text("IP Address:", 0, 16)?;
    sink.draw_text(&text, 0, 32)?;
    sink.present()
}

/// Sample, convert, redraw, sleep. Forever.
pub struct DisplayLoop<'a, S: ?Sized, K, T> {
    context: AppContext<'a, S>,
    sink: K,
    delay: T,
}

impl<'a, S, K, T> DisplayLoop<'a, S, K, T>
where
    S: BitSource + ?Sized,
    K: DisplaySink,
    T: DelayNs,
{
    pub fn new(context: AppContext<'a, S>, sink: K, delay: T) -> Self {
        Self {
            context,
            sink,
            delay,
        }
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Time between two refreshes.
    pub fn interval_ms(&self) -> u32 {
        self.context.deployment.refresh_interval_ms
    }

    /// One full redraw from a fresh sample.
    pub fn refresh(&mut self) -> Result<(), AppError> {
        let snapshot = self.context.snapshot();
        render(&mut self.sink, self.context.deployment.layout, &snapshot)
            .map_err(|err| AppError::display(&err))
    }

    pub async fn run(&mut self) -> ! {
        let interval = self.interval_ms();
        info!("Display loop running every {} ms", interval);

        loop {
            if let Err(err) = self.refresh() {
                warn!("{}", err);
            }
            self.delay.delay_ms(interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::{String, ToString};
    use alloc::vec;
    use alloc::vec::Vec;
    use core::convert::Infallible;

    use super::*;
    use crate::config::{CLASSIC, HEX};
    use crate::switches::BitVector;
    use crate::test_support::FixedSource;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Op {
        Clear,
        Text(String, i32, i32),
        Present,
    }

    #[derive(Default)]
    struct RecordingSink {
        ops: Vec<Op>,
        fail_present: bool,
    }

    impl RecordingSink {
        fn texts(&self) -> Vec<(&str, i32, i32)> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    Op::Text(text, x, y) => Some((text.as_str(), *x, *y)),
                    _ => None,
                })
                .collect()
        }
    }

    impl DisplaySink for RecordingSink {
        type Error = &'static str;

        fn clear(&mut self) -> Result<(), Self::Error> {
            self.ops.push(Op::Clear);
            Ok(())
        }

        fn draw_text(&mut self, text: &str, x: i32, y: i32) -> Result<(), Self::Error> {
            self.ops.push(Op::Text(text.to_string(), x, y));
            Ok(())
        }

        fn present(&mut self) -> Result<(), Self::Error> {
            if self.fail_present {
                return Err("bus nack");
            }
            self.ops.push(Op::Present);
            Ok(())
        }
    }

    /// Framebuffer that tolerates overdraw.
    struct Framebuffer {
        pixels: Vec<bool>,
    }

    impl Framebuffer {
        fn new() -> Self {
            Self {
                pixels: vec![false; (DISPLAY_WIDTH_PX * DISPLAY_HEIGHT_PX) as usize],
            }
        }

        fn lit(&self) -> usize {
            self.pixels.iter().filter(|&&on| on).count()
        }
    }

    impl OriginDimensions for Framebuffer {
        fn size(&self) -> Size {
            Size::new(DISPLAY_WIDTH_PX, DISPLAY_HEIGHT_PX)
        }
    }

    impl DrawTarget for Framebuffer {
        type Color = BinaryColor;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            for Pixel(point, color) in pixels {
                if self.bounding_box().contains(point) {
                    let index = point.y as u32 * DISPLAY_WIDTH_PX + point.x as u32;
                    self.pixels[index as usize] = color.is_on();
                }
            }
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn test_compact_layout() {
        let snapshot = ValueSnapshot::new(BitVector::from_value(181), true);
        let mut sink = RecordingSink::default();

        render(&mut sink, DisplayLayout::Compact, &snapshot).unwrap();

        assert_eq!(sink.ops.first(), Some(&Op::Clear));
        assert_eq!(sink.ops.last(), Some(&Op::Present));
        assert_eq!(
            sink.texts(),
            [
                ("Bin:", 0, 0),
                ("10110101", 40, 0),
                ("Hex:", 0, 20),
                ("B5", 40, 20),
                ("Dec:", 0, 40),
                ("181", 40, 40),
            ]
        );
    }

    #[test]
    fn test_compact_layout_without_hex_in_snapshot() {
        let snapshot = ValueSnapshot::new(BitVector::ONES, false);
        let mut sink = RecordingSink::default();

        render(&mut sink, DisplayLayout::Compact, &snapshot).unwrap();
        assert!(sink.texts().contains(&("FF", 40, 20)));
    }

    #[test]
    fn test_stacked_layout() {
        let snapshot = ValueSnapshot::new(BitVector::from_value(7), false);
        let mut sink = RecordingSink::default();

        render(&mut sink, DisplayLayout::Stacked, &snapshot).unwrap();
        assert_eq!(
            sink.texts(),
            [
                ("Binary:", 0, 0),
                ("00000111", 0, 12),
                ("Decimal:", 0, 30),
                ("7", 0, 42),
            ]
        );
    }

    #[test]
    fn test_boot_screen() {
        let mut sink = RecordingSink::default();

        render_boot_screen(&mut sink, Ipv4Addr::new(192, 168, 4, 1)).unwrap();
        assert_eq!(
            sink.texts(),
            [
                ("WiFi Ready!", 0, 0),
                ("IP Address:", 0, 16),
                ("192.168.4.1", 0, 32),
            ]
        );
    }

    #[test]
    fn test_graphics_sink_draws_and_presents() {
        let mut presented = 0;
        let mut sink = GraphicsSink::new(Framebuffer::new(), |_: &mut Framebuffer| {
            presented += 1;
            Ok::<(), Infallible>(())
        });

        let snapshot = ValueSnapshot::new(BitVector::ONES, true);
        render(&mut sink, DisplayLayout::Compact, &snapshot).unwrap();
        let lit = sink.target().lit();
        assert!(lit > 0);

        sink.clear().unwrap();
        assert_eq!(sink.target().lit(), 0);
        drop(sink);
        assert_eq!(presented, 1);
    }

    #[test]
    fn test_refresh_uses_deployment_layout() {
        let source = FixedSource(BitVector::from_value(2));
        let mut display_loop =
            DisplayLoop::new(AppContext::new(&source, &CLASSIC), RecordingSink::default(), NoDelay);

        display_loop.refresh().unwrap();
        assert!(display_loop.sink().texts().contains(&("Decimal:", 0, 30)));
        assert!(display_loop.sink().texts().contains(&("00000010", 0, 12)));
        assert_eq!(display_loop.interval_ms(), CLASSIC.refresh_interval_ms);
    }

    #[test]
    fn test_refresh_reports_display_error() {
        let source = FixedSource(BitVector::ZERO);
        let sink = RecordingSink {
            fail_present: true,
            ..Default::default()
        };
        let mut display_loop = DisplayLoop::new(AppContext::new(&source, &HEX), sink, NoDelay);

        assert_eq!(
            display_loop.refresh(),
            Err(AppError::Display(heapless::String::try_from("\"bus nack\"").unwrap()))
        );
    }
}
