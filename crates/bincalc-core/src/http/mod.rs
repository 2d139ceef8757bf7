//! Minimal HTTP/1.x request handling
//!
//! One request per connection. The handler reads the request target, matches
//! it against a fixed route table and builds a typed [`Response`]. Headers
//! and body of the request are never inspected.

use log::{debug, warn};

use crate::app_state::{AppContext, AppError};
use crate::switches::BitSource;

mod page;
pub mod request;
pub mod response;

pub use request::request_target;
pub use response::{ContentType, Response, Status};

/// How the index page presents values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStyle {
    /// Static page whose script polls `/json`.
    Polling,
    /// Values embedded into the page on every request.
    Rendered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Index,
    Snapshot,
}

impl Route {
    /// Exact-match lookup of a request target.
    pub fn resolve(target: &str) -> Result<Self, AppError> {
        match target {
            "/" | "/index.html" => Ok(Route::Index),
            "/json" => Ok(Route::Snapshot),
            other => Err(AppError::unrouted(other)),
        }
    }
}

/// Turns raw request bytes into a response using live switch state.
pub struct RequestHandler<'a, S: ?Sized> {
    context: AppContext<'a, S>,
}

impl<'a, S: BitSource + ?Sized> RequestHandler<'a, S> {
    pub fn new(context: AppContext<'a, S>) -> Self {
        Self { context }
    }

    /// Build the response for one request.
    ///
    /// Unknown paths produce a 404 response. Only a request without a
    /// target is an error, and the caller must close without replying.
    pub fn handle(&self, raw: &[u8]) -> Result<Response, AppError> {
        let target = request_target(raw)?;
        let route = match Route::resolve(target) {
            Ok(route) => route,
            Err(err) => {
                warn!("{}", err);
                return Ok(Response::not_found());
            }
        };
        debug!("GET {} -> {:?}", target, route);

        let deployment = self.context.deployment;
        Ok(match route {
            Route::Index => match deployment.page {
                PageStyle::Polling if deployment.include_hex => Response::html(page::POLLING_PAGE_HEX),
                PageStyle::Polling => Response::html(page::POLLING_PAGE),
                PageStyle::Rendered => {
                    Response::html(page::render_snapshot_page(&self.context.snapshot()))
                }
            },
            Route::Snapshot => Response::json(page::snapshot_json(&self.context.snapshot())),
        })
    }
}
