#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use bincalc_core::display::{DisplayLoop, GraphicsSink, render_boot_screen};
use bincalc_core::server::{Server, ShutdownSignal};
use bincalc_firmware::app_state::{
    AppContext, AppRunState, Oled, Switches, init_display, init_switches,
};
use bincalc_firmware::deployment::DEPLOYMENT;
use bincalc_firmware::network::{bind_http_listener, bring_up_access_point, http_server_task};
use embassy_executor::Spawner;
use embassy_time::{Delay, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::Pin;
use esp_hal::timer::timg::TimerGroup;
use log::{info, warn};
use static_cell::StaticCell;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

static SWITCHES: StaticCell<Switches> = StaticCell::new();
static SHUTDOWN: ShutdownSignal = ShutdownSignal::new();

fn enter(state: AppRunState) {
    info!("State: {:?}", state);
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();
    enter(AppRunState::Booting);
    info!("Deployment profile: {}", DEPLOYMENT.name);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 98768);
    esp_alloc::heap_allocator!(size: 64 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    #[cfg(not(feature = "profile-classic"))]
    let pins = [
        peripherals.GPIO13.degrade(),
        peripherals.GPIO27.degrade(),
        peripherals.GPIO25.degrade(),
        peripherals.GPIO16.degrade(),
        peripherals.GPIO17.degrade(),
        peripherals.GPIO18.degrade(),
        peripherals.GPIO19.degrade(),
        peripherals.GPIO26.degrade(),
    ];
    #[cfg(feature = "profile-classic")]
    let pins = [
        peripherals.GPIO2.degrade(),
        peripherals.GPIO3.degrade(),
        peripherals.GPIO4.degrade(),
        peripherals.GPIO5.degrade(),
        peripherals.GPIO18.degrade(),
        peripherals.GPIO19.degrade(),
        peripherals.GPIO23.degrade(),
        peripherals.GPIO25.degrade(),
    ];
    let switches: &'static Switches = SWITCHES.init(init_switches(pins, DEPLOYMENT.switches));
    let context = AppContext::new(switches, &DEPLOYMENT);

    let display = init_display(peripherals.I2C0, peripherals.GPIO21, peripherals.GPIO22)
        .expect("Failed to initialize display");
    let mut sink = GraphicsSink::new(display, |display: &mut Oled| display.flush());

    enter(AppRunState::AccessPointStarting);
    let (stack, address) =
        match bring_up_access_point(&spawner, peripherals.WIFI, &DEPLOYMENT.access_point).await {
            Ok(up) => up,
            Err(err) => {
                enter(AppRunState::Failed);
                panic!("{}", err);
            }
        };
    enter(AppRunState::AccessPointReady);

    let server = match Server::new(context) {
        Ok(server) => server,
        Err(err) => {
            enter(AppRunState::Failed);
            panic!("{}", err);
        }
    };
    let listener = bind_http_listener(stack, &server);
    match http_server_task(server, listener, &SHUTDOWN) {
        Ok(token) => spawner.spawn(token),
        Err(err) => {
            enter(AppRunState::Failed);
            panic!("Failed to spawn HTTP server: {:?}", err);
        }
    }
    enter(AppRunState::Serving);
    info!("Web server running at http://{}", address);

    if let Some(hold_ms) = DEPLOYMENT.boot_screen_ms {
        if let Err(err) = render_boot_screen(&mut sink, address) {
            warn!("Boot screen failed: {:?}", err);
        }
        Timer::after_millis(u64::from(hold_ms)).await;
    }

    DisplayLoop::new(context, sink, Delay).run().await
}
