//! Wi-Fi access point, network stack and the tasks that run on it

use alloc::string::String;
use core::net::Ipv4Addr;

use bincalc_core::app_state::AppError;
use bincalc_core::config::AccessPointConfig;
use bincalc_core::dhcp::{self, DhcpServer};
use bincalc_core::server::{Listener, ListenerError, Server, ShutdownSignal};
use embassy_executor::Spawner;
use embassy_net::tcp::{AcceptError, TcpSocket};
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpAddress, IpEndpoint, Ipv4Cidr, Runner, Stack, StackResources, StaticConfigV4};
use embassy_time::{Instant, Timer};
use embedded_io_async::{ErrorKind, ErrorType, Read, Write};
use esp_hal::rng::Rng;
use esp_radio::wifi::{
    AccessPointConfig as RadioApConfig, AuthMethod, ModeConfig, WifiController, WifiDevice,
    WifiEvent,
};
use log::{debug, error, info, warn};
use static_cell::StaticCell;

use crate::app_state::Switches;

const RX_BUFFER_SIZE: usize = 1536;
const TX_BUFFER_SIZE: usize = 4096;
const SOCKET_COUNT: usize = 4;

static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<SOCKET_COUNT>> = StaticCell::new();
static HTTP_RX_BUFFER: StaticCell<[u8; RX_BUFFER_SIZE]> = StaticCell::new();
static HTTP_TX_BUFFER: StaticCell<[u8; TX_BUFFER_SIZE]> = StaticCell::new();

/// Start the access point and its network stack.
///
/// Spawns the stack runner, the access point supervisor and the DHCP
/// responder, then waits until the interface is up.
pub async fn bring_up_access_point(
    spawner: &Spawner,
    wifi: esp_hal::peripherals::WIFI<'static>,
    access_point: &AccessPointConfig<'static>,
) -> Result<(Stack<'static>, Ipv4Addr), AppError> {
    let radio = RADIO.init(esp_radio::init().map_err(|err| AppError::access_point(&err))?);
    let (mut controller, interfaces) = esp_radio::wifi::new(radio, wifi, Default::default())
        .map_err(|err| AppError::access_point(&err))?;

    let mode = ModeConfig::AccessPoint(
        RadioApConfig::default()
            .with_ssid(String::from(access_point.ssid))
            .with_password(String::from(access_point.password))
            .with_auth_method(AuthMethod::Wpa2Personal),
    );
    controller
        .set_config(&mode)
        .map_err(|err| AppError::access_point(&err))?;
    info!("Starting access point \"{}\"", access_point.ssid);
    controller
        .start_async()
        .await
        .map_err(|err| AppError::access_point(&err))?;

    let config = embassy_net::Config::ipv4_static(StaticConfigV4 {
        address: Ipv4Cidr::new(access_point.address, access_point.prefix_len),
        gateway: None,
        dns_servers: Default::default(),
    });
    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let (stack, runner) = embassy_net::new(
        interfaces.ap,
        config,
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );

    spawner.spawn(net_task(runner).map_err(|err| AppError::access_point(&err))?);
    spawner.spawn(access_point_task(controller).map_err(|err| AppError::access_point(&err))?);
    spawner.spawn(
        dhcp_task(stack, access_point.address, access_point.netmask())
            .map_err(|err| AppError::access_point(&err))?,
    );

    stack.wait_config_up().await;
    let address = stack
        .config_v4()
        .map(|config| config.address.address())
        .unwrap_or(access_point.address);
    info!("Access point up at {}", address);

    Ok((stack, address))
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await;
}

/// Restart the access point whenever the driver reports it stopped.
#[embassy_executor::task]
async fn access_point_task(mut controller: WifiController<'static>) {
    loop {
        controller.wait_for_event(WifiEvent::ApStop).await;
        warn!("Access point stopped, restarting");
        if let Err(err) = controller.start_async().await {
            error!("Access point restart failed: {:?}", err);
            Timer::after_secs(5).await;
        }
    }
}

#[embassy_executor::task]
async fn dhcp_task(stack: Stack<'static>, server_ip: Ipv4Addr, netmask: Ipv4Addr) {
    let mut rx_meta = [PacketMetadata::EMPTY; 4];
    let mut rx_buffer = [0u8; 1024];
    let mut tx_meta = [PacketMetadata::EMPTY; 4];
    let mut tx_buffer = [0u8; 1024];
    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );

    if let Err(err) = socket.bind(dhcp::SERVER_PORT) {
        error!("DHCP server failed to bind: {:?}", err);
        return;
    }
    info!("DHCP server listening on {}", server_ip);

    let mut server = DhcpServer::for_access_point(server_ip, netmask);
    let mut frame = [0u8; dhcp::PACKET_BUFFER_SIZE];
    let mut reply = [0u8; dhcp::PACKET_BUFFER_SIZE];
    let broadcast = IpEndpoint::new(IpAddress::Ipv4(Ipv4Addr::BROADCAST), dhcp::CLIENT_PORT);

    loop {
        let len = match socket.recv_from(&mut frame).await {
            Ok((len, _)) => len,
            Err(err) => {
                warn!("DHCP receive failed: {:?}", err);
                continue;
            }
        };

        let now = Instant::now().as_secs();
        let Some(reply_len) = server.respond(&frame[..len], now, &mut reply) else {
            continue;
        };
        if let Err(err) = socket.send_to(&reply[..reply_len], broadcast).await {
            warn!("DHCP send failed: {:?}", err);
        }
    }
}

/// An accepted TCP connection.
pub struct SocketStream<'a>(TcpSocket<'a>);

impl ErrorType for SocketStream<'_> {
    type Error = ErrorKind;
}

impl Read for SocketStream<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
        self.0.read(buf).await.map_err(|_| ErrorKind::ConnectionReset)
    }
}

impl Write for SocketStream<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
        self.0.write(buf).await.map_err(|_| ErrorKind::ConnectionReset)
    }

    async fn flush(&mut self) -> Result<(), ErrorKind> {
        self.0.flush().await.map_err(|_| ErrorKind::ConnectionReset)
    }
}

/// One reusable socket accepting on a fixed port.
pub struct TcpListener<'a> {
    stream: SocketStream<'a>,
    port: u16,
}

impl<'a> TcpListener<'a> {
    pub fn new(stack: Stack<'a>, rx_buffer: &'a mut [u8], tx_buffer: &'a mut [u8], port: u16) -> Self {
        Self {
            stream: SocketStream(TcpSocket::new(stack, rx_buffer, tx_buffer)),
            port,
        }
    }
}

/// Listener for `server` on the statically allocated HTTP socket buffers.
///
/// Must be called at most once.
pub fn bind_http_listener(
    stack: Stack<'static>,
    server: &Server<'static, Switches>,
) -> TcpListener<'static> {
    let rx_buffer = HTTP_RX_BUFFER.init([0; RX_BUFFER_SIZE]);
    let tx_buffer = HTTP_TX_BUFFER.init([0; TX_BUFFER_SIZE]);
    TcpListener::new(stack, rx_buffer, tx_buffer, server.port())
}

impl<'a> Listener for TcpListener<'a> {
    type Stream = SocketStream<'a>;
    type Error = AcceptError;

    async fn accept(&mut self) -> Result<&mut SocketStream<'a>, ListenerError<AcceptError>> {
        match self.stream.0.accept(self.port).await {
            Ok(()) => {
                debug!("Client connected: {:?}", self.stream.0.remote_endpoint());
                Ok(&mut self.stream)
            }
            Err(err @ AcceptError::InvalidPort) => Err(ListenerError::Fatal(err)),
            Err(err) => {
                self.stream.0.abort();
                Err(ListenerError::Transient(err))
            }
        }
    }

    async fn close(&mut self) {
        let socket = &mut self.stream.0;
        let _ = socket.flush().await;
        socket.close();
        Timer::after_millis(50).await;
        socket.abort();
    }
}

/// Runs the sequential HTTP server until it is shut down or fails.
#[embassy_executor::task]
pub async fn http_server_task(
    server: Server<'static, Switches>,
    mut listener: TcpListener<'static>,
    shutdown: &'static ShutdownSignal,
) {
    match server.run(&mut listener, shutdown).await {
        Ok(exit) => info!("HTTP server stopped: {:?}", exit),
        Err(err) => error!("HTTP server failed: {}", err),
    }
}
