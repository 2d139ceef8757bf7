//! Sequential HTTP server loop
//!
//! The loop accepts one connection, reads a single request, answers it and
//! closes the connection before accepting the next one. The transport is
//! abstracted by [`Listener`] so the same loop runs on an embassy-net TCP
//! socket in the firmware and on a host socket in the simulator.

use core::fmt::Debug;

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embedded_io_async::{Read, Write};
use log::{debug, error, info, warn};

use crate::app_state::{AppContext, AppError};
use crate::http::RequestHandler;
use crate::switches::BitSource;

/// Bytes of the request kept for parsing. Anything beyond is never read.
pub const REQUEST_BUFFER_SIZE: usize = 1024;

/// Raised to stop the server loop between connections.
pub type ShutdownSignal = Signal<CriticalSectionRawMutex, ()>;

/// Failure to accept a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerError<E> {
    /// The attempt failed but the listener can be used again.
    Transient(E),
    /// The listener is unusable.
    Fatal(E),
}

/// A bound endpoint handing out one connection at a time.
#[allow(async_fn_in_trait)]
pub trait Listener {
    type Stream: Read + Write;
    type Error: Debug;

    /// Wait for the next client.
    async fn accept(&mut self) -> Result<&mut Self::Stream, ListenerError<Self::Error>>;

    /// Close the connection returned by the last successful `accept`.
    async fn close(&mut self);
}

/// Why the loop returned without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerExit {
    Shutdown,
}

pub struct Server<'a, S: ?Sized> {
    handler: RequestHandler<'a, S>,
    port: u16,
}

impl<'a, S: BitSource + ?Sized> Server<'a, S> {
    /// Fails with [`AppError::TransportBind`] when the deployment names no
    /// port to listen on.
    pub fn new(context: AppContext<'a, S>) -> Result<Self, AppError> {
        let port = context.deployment.http_port;
        if port == 0 {
            return Err(AppError::TransportBind { port });
        }
        Ok(Self {
            handler: RequestHandler::new(context),
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve connections until `shutdown` is raised or the listener fails.
    ///
    /// The signal is only observed while waiting for a client, so an
    /// exchange in progress always completes.
    pub async fn run<L: Listener>(
        &self,
        listener: &mut L,
        shutdown: &ShutdownSignal,
    ) -> Result<ServerExit, AppError> {
        info!("HTTP server listening on port {}", self.port);

        loop {
            let accepted = match select(listener.accept(), shutdown.wait()).await {
                Either::First(accepted) => accepted,
                Either::Second(()) => {
                    info!("HTTP server shutting down");
                    return Ok(ServerExit::Shutdown);
                }
            };

            match accepted {
                Ok(stream) => {
                    match self.serve_connection(stream).await {
                        Ok(()) => {}
                        Err(AppError::MalformedRequest) => {
                            debug!("Malformed request, closing without response");
                        }
                        Err(err) => warn!("Connection failed: {}", err),
                    }
                    listener.close().await;
                }
                Err(ListenerError::Transient(err)) => {
                    warn!("Accept failed: {:?}", err);
                }
                Err(ListenerError::Fatal(err)) => {
                    error!("Listener failed: {:?}", err);
                    return Err(AppError::transport(&err));
                }
            }
        }
    }

    /// Handle exactly one request on an accepted connection.
    ///
    /// Nothing is written when the request is malformed.
    pub async fn serve_connection<C: Read + Write>(&self, conn: &mut C) -> Result<(), AppError> {
        let mut buffer = [0u8; REQUEST_BUFFER_SIZE];
        let len = read_request(conn, &mut buffer).await?;
        let response = self.handler.handle(&buffer[..len])?;

        response
            .write_to(conn)
            .await
            .map_err(|_| AppError::Connection)
    }
}

/// Read until the request line is complete, the peer closes or `buffer` is full.
pub async fn read_request<C: Read>(conn: &mut C, buffer: &mut [u8]) -> Result<usize, AppError> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = conn
            .read(&mut buffer[filled..])
            .await
            .map_err(|_| AppError::Connection)?;
        if n == 0 {
            break;
        }
        let seen = filled;
        filled += n;
        if buffer[seen..filled].contains(&b'\n') {
            break;
        }
    }
    Ok(filled)
}
