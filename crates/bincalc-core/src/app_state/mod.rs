//! Application-wide state and error types for bincalc

use core::fmt::{Debug, Write};

use thiserror_no_std::Error;

use crate::codec::ValueSnapshot;
use crate::config::Deployment;
use crate::switches::BitSource;

/// Boot progression of the device, logged as the firmware comes up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    Booting,
    AccessPointStarting,
    AccessPointReady,
    Serving,
    Failed,
}

/// Errors surfaced anywhere in the application.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Cannot listen on port {port}")]
    TransportBind { port: u16 },
    #[error("Malformed request")]
    MalformedRequest,
    #[error("No route for {0}")]
    UnroutedPath(heapless::String<64>),
    #[error("Transport failed: {0}")]
    Transport(heapless::String<64>),
    #[error("Connection I/O failed")]
    Connection,
    #[error("Display error: {0}")]
    Display(heapless::String<64>),
    #[error("Access point bring-up failed: {0}")]
    AccessPoint(heapless::String<64>),
}

impl AppError {
    pub fn unrouted(path: &str) -> Self {
        Self::UnroutedPath(heapless::String::from_truncated(path))
    }

    /// Capture a driver error through its `Debug` output.
    pub fn transport(error: &impl Debug) -> Self {
        Self::Transport(debug_string(error))
    }

    pub fn display(error: &impl Debug) -> Self {
        Self::Display(debug_string(error))
    }

    pub fn access_point(error: &impl Debug) -> Self {
        Self::AccessPoint(debug_string(error))
    }
}

fn debug_string<const N: usize>(error: &impl Debug) -> heapless::String<N> {
    let mut out = heapless::String::new();
    // Overlong messages are cut at capacity.
    let _ = write!(out, "{:?}", error);
    out
}

pub trait FromTruncated<T> {
    fn from_truncated(value: T) -> Self;
}

impl<'a, const N: usize> FromTruncated<&'a str> for heapless::String<N> {
    fn from_truncated(value: &'a str) -> Self {
        let mut out = heapless::String::new();
        for c in value.chars() {
            if out.push(c).is_err() {
                break;
            }
        }
        out
    }
}

/// Shared, read-only context handed to both the display loop and the server.
///
/// Holds the bit source by reference so both execution contexts read the
/// same hardware lines without owning them.
pub struct AppContext<'a, S: ?Sized> {
    pub source: &'a S,
    pub deployment: &'a Deployment,
}

impl<S: ?Sized> Clone for AppContext<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized> Copy for AppContext<'_, S> {}

impl<'a, S: BitSource + ?Sized> AppContext<'a, S> {
    pub fn new(source: &'a S, deployment: &'a Deployment) -> Self {
        Self { source, deployment }
    }

    /// Take a fresh sample and derive every representation from it.
    pub fn snapshot(&self) -> ValueSnapshot {
        ValueSnapshot::new(self.source.sample(), self.deployment.include_hex)
    }
}
