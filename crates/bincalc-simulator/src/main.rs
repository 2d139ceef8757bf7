//! Desktop simulator for the bincalc switch calculator.
//!
//! Renders the calculator display in an SDL2 window via
//! `embedded-graphics-simulator` and serves the same web endpoint on
//! `http://127.0.0.1:8080`. The switches are simulated from the keyboard.
//!
//! # Key bindings
//!
//! | Key   | Action                              |
//! |-------|-------------------------------------|
//! | 1..8  | Toggle the switch on that input line |
//! | 0     | Release every switch                |
//! | Q     | Quit                                |
//!
//! The profile follows the `profile-*` Cargo features, as on the device:
//! `cargo run -p bincalc-simulator --features profile-classic`.

use std::io::{self, ErrorKind as IoErrorKind};
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::{
    BinaryColorTheme, OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window,
    sdl2::Keycode,
};
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{ErrorKind, ErrorType, Read, Write};
use log::{debug, error, info};

use bincalc_core::app_state::{AppContext, AppError};
use bincalc_core::config::Deployment;
use bincalc_core::display::{
    DISPLAY_HEIGHT_PX, DISPLAY_WIDTH_PX, DisplayLoop, GraphicsSink, render_boot_screen,
};
use bincalc_core::server::{Listener, ListenerError, Server, ShutdownSignal};
use bincalc_core::switches::{Polarity, SWITCH_COUNT, SwitchBank};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Pixel scale factor for the simulator window.
const WINDOW_SCALE: u32 = 4;

/// Target frame duration (~30 FPS).
const FRAME_DURATION: Duration = Duration::from_millis(33);

/// Unprivileged stand-in for the device's port 80.
const HTTP_ADDR: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), 8080);

/// How often the non-blocking listener is polled while idle.
const ACCEPT_POLL: Duration = Duration::from_millis(20);

#[cfg(feature = "profile-classic")]
const DEPLOYMENT: Deployment = bincalc_core::config::CLASSIC;

#[cfg(all(feature = "profile-decimal", not(feature = "profile-classic")))]
const DEPLOYMENT: Deployment = bincalc_core::config::DECIMAL;

#[cfg(not(any(feature = "profile-decimal", feature = "profile-classic")))]
const DEPLOYMENT: Deployment = bincalc_core::config::HEX;

/// Simulated input line levels, `true` = high.
static LINE_LEVELS: [AtomicBool; SWITCH_COUNT] = [const { AtomicBool::new(false) }; SWITCH_COUNT];

static SHUTDOWN: ShutdownSignal = ShutdownSignal::new();

type SimSwitches = SwitchBank<&'static AtomicBool>;

// ---------------------------------------------------------------------------
// Host transport
// ---------------------------------------------------------------------------

/// Blocking host socket exposed through the async I/O traits.
struct HostStream(TcpStream);

impl ErrorType for HostStream {
    type Error = ErrorKind;
}

fn map_io_error(err: io::Error) -> ErrorKind {
    debug!("Socket error: {}", err);
    match err.kind() {
        IoErrorKind::BrokenPipe => ErrorKind::BrokenPipe,
        IoErrorKind::ConnectionAborted => ErrorKind::ConnectionAborted,
        _ => ErrorKind::ConnectionReset,
    }
}

impl Read for HostStream {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
        io::Read::read(&mut self.0, buf).map_err(map_io_error)
    }
}

impl Write for HostStream {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
        io::Write::write(&mut self.0, buf).map_err(map_io_error)
    }

    async fn flush(&mut self) -> Result<(), ErrorKind> {
        io::Write::flush(&mut self.0).map_err(map_io_error)
    }
}

/// Non-blocking accept so the shutdown signal is observed while idle.
struct HostListener {
    listener: std::net::TcpListener,
    current: Option<HostStream>,
}

impl HostListener {
    fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = std::net::TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            current: None,
        })
    }
}

impl Listener for HostListener {
    type Stream = HostStream;
    type Error = io::Error;

    async fn accept(&mut self) -> Result<&mut HostStream, ListenerError<io::Error>> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!("Client connected: {}", peer);
                    stream.set_nonblocking(false).map_err(ListenerError::Transient)?;
                    return Ok(self.current.insert(HostStream(stream)));
                }
                Err(err) if err.kind() == IoErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL);
                    embassy_futures::yield_now().await;
                }
                Err(err) if err.kind() == IoErrorKind::Interrupted => {}
                Err(err) => return Err(ListenerError::Transient(err)),
            }
        }
    }

    async fn close(&mut self) {
        if let Some(HostStream(mut stream)) = self.current.take() {
            // Unread bytes at close turn the FIN into a reset.
            drain_readable(&mut stream);
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }
}

/// Discard whatever the peer has already sent, without waiting for more.
fn drain_readable(stream: &mut TcpStream) {
    if stream.set_nonblocking(true).is_err() {
        return;
    }
    let mut scratch = [0u8; 512];
    let mut drained = 0;
    while let Ok(n @ 1..) = io::Read::read(stream, &mut scratch) {
        drained += n;
    }
    if drained > 0 {
        debug!("Discarded {} unread request bytes", drained);
    }
}

/// Thread sleep behind the async delay trait.
struct StdDelay;

impl DelayNs for StdDelay {
    async fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

// ---------------------------------------------------------------------------
// Switch helpers
// ---------------------------------------------------------------------------

/// Put every line at the level of an open switch.
fn release_all(polarity: Polarity) {
    let open_level = polarity == Polarity::ActiveLow;
    for line in &LINE_LEVELS {
        line.store(open_level, Ordering::Relaxed);
    }
}

/// Map an SDL keycode to an input line index.
fn keycode_to_line(keycode: Keycode) -> Option<usize> {
    match keycode {
        Keycode::Num1 | Keycode::Kp1 => Some(0),
        Keycode::Num2 | Keycode::Kp2 => Some(1),
        Keycode::Num3 | Keycode::Kp3 => Some(2),
        Keycode::Num4 | Keycode::Kp4 => Some(3),
        Keycode::Num5 | Keycode::Kp5 => Some(4),
        Keycode::Num6 | Keycode::Kp6 => Some(5),
        Keycode::Num7 | Keycode::Kp7 => Some(6),
        Keycode::Num8 | Keycode::Kp8 => Some(7),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();

    let deployment: &'static Deployment = &DEPLOYMENT;
    info!("Starting bincalc simulator with profile {}", deployment.name);
    info!("Keys: 1-8=Toggle switch  0=Release all  Q=Quit");

    release_all(deployment.switches.polarity);
    let switches: &'static SimSwitches = Box::leak(Box::new(SwitchBank::new(
        LINE_LEVELS.each_ref(),
        deployment.switches,
    )));
    let context = AppContext::new(switches, deployment);

    let server = Server::new(context).and_then(|server| {
        let listener = HostListener::bind(HTTP_ADDR).map_err(|err| {
            error!("Cannot listen on {}: {}", HTTP_ADDR, err);
            AppError::TransportBind {
                port: HTTP_ADDR.port(),
            }
        })?;
        Ok((server, listener))
    });
    let (server, mut listener) = match server {
        Ok(bound) => bound,
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    };
    info!("Web server running at http://{}", HTTP_ADDR);
    let server_thread = thread::spawn(move || {
        match embassy_futures::block_on(server.run(&mut listener, &SHUTDOWN)) {
            Ok(exit) => info!("HTTP server stopped: {:?}", exit),
            Err(err) => error!("HTTP server failed: {}", err),
        }
    });

    // SDL2 display and window
    let display = SimulatorDisplay::<BinaryColor>::new(Size::new(DISPLAY_WIDTH_PX, DISPLAY_HEIGHT_PX));
    let mut sink = GraphicsSink::new(display, |_: &mut SimulatorDisplay<BinaryColor>| {
        Ok::<(), core::convert::Infallible>(())
    });

    let output_settings = OutputSettingsBuilder::new()
        .scale(WINDOW_SCALE)
        .theme(BinaryColorTheme::OledBlue)
        .build();
    let mut window = Window::new("Bincalc Simulator", &output_settings);

    // The SDL window is lazily initialized on the first `update()` call.
    // We must call `update()` once before `events()` or it will panic.
    if let Err(err) = render_boot_screen(&mut sink, Ipv4Addr::LOCALHOST) {
        error!("Draw error: {:?}", err);
    }
    window.update(sink.target());

    let mut display_loop = DisplayLoop::new(context, sink, StdDelay);
    let refresh_interval = Duration::from_millis(u64::from(display_loop.interval_ms()));
    let boot_hold = deployment
        .boot_screen_ms
        .map(|ms| Duration::from_millis(u64::from(ms)))
        .unwrap_or_default();
    let started = Instant::now();
    let mut last_refresh: Option<Instant> = None;

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------
    'running: loop {
        let frame_start = Instant::now();

        // --- SDL events ---------------------------------------------------
        for event in window.events() {
            match event {
                SimulatorEvent::Quit => break 'running,

                SimulatorEvent::KeyDown { keycode, .. } => {
                    if keycode == Keycode::Q || keycode == Keycode::Escape {
                        break 'running;
                    }
                    if keycode == Keycode::Num0 || keycode == Keycode::Kp0 {
                        release_all(deployment.switches.polarity);
                    } else if let Some(line) = keycode_to_line(keycode) {
                        let was_high = LINE_LEVELS[line].fetch_xor(true, Ordering::Relaxed);
                        debug!("Line {} now {}", line + 1, if was_high { "low" } else { "high" });
                    }
                }

                _ => {}
            }
        }

        // --- Render -------------------------------------------------------
        let due = last_refresh.is_none_or(|at| at.elapsed() >= refresh_interval);
        if started.elapsed() >= boot_hold && due {
            if let Err(err) = display_loop.refresh() {
                error!("{}", err);
            }
            last_refresh = Some(Instant::now());
        }

        window.update(display_loop.sink().target());

        // --- Frame pacing -------------------------------------------------
        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_DURATION {
            thread::sleep(FRAME_DURATION - elapsed);
        }
    }

    SHUTDOWN.signal(());
    if server_thread.join().is_err() {
        error!("HTTP server thread panicked");
    }

    info!("Simulator exiting");
}
