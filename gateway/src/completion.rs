//! Completion object for a single outbound backend call.
//!
//! A [`CallResult`] is fed by the backend client as the exchange progresses
//! (status, headers, body chunks) and is finished exactly once, either by
//! [`CallResult::on_complete`] or [`CallResult::on_error`]. A completion
//! handler may be attached at any time. It runs once, after the call is
//! finished, whichever of the two happens last.

use crate::errors::BackendError;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Callback invoked with the finished exchange
pub type CompletionHandler = Box<dyn FnOnce(CallOutcome) + Send + 'static>;

/// Snapshot of a finished call, handed to the completion handler
#[derive(Debug)]
pub struct CallOutcome {
    pub url: String,
    pub status: Option<StatusCode>,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub error: Option<BackendError>,
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The accumulated body, or the error the call finished with
    pub fn into_body(self) -> Result<Bytes, BackendError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.body),
        }
    }
}

#[derive(Default)]
struct Exchange {
    status: Option<StatusCode>,
    status_text: String,
    headers: HeaderMap,
    body: BytesMut,
    error: Option<BackendError>,
}

enum HandlerSlot {
    Empty,
    Attached(CompletionHandler),
    Fired,
}

pub struct CallResult {
    url: String,
    complete: AtomicBool,
    // Terminal transitions flip `complete` while holding this lock, so a reader
    // that observes `complete` and then locks sees the final state.
    exchange: Mutex<Exchange>,
    handler: Mutex<HandlerSlot>,
}

impl CallResult {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            complete: AtomicBool::new(false),
            exchange: Mutex::new(Exchange::default()),
            handler: Mutex::new(HandlerSlot::Empty),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.exchange.lock().status
    }

    pub fn status_text(&self) -> String {
        self.exchange.lock().status_text.clone()
    }

    pub fn headers(&self) -> HeaderMap {
        self.exchange.lock().headers.clone()
    }

    /// Records the response status. Ignored once the call is finished.
    pub fn on_status(&self, status: StatusCode, text: &str) {
        let mut exchange = self.exchange.lock();
        if self.is_complete() {
            return;
        }
        exchange.status = Some(status);
        exchange.status_text = text.to_string();
    }

    /// Records the response headers. Ignored once the call is finished.
    pub fn on_headers(&self, headers: HeaderMap) {
        let mut exchange = self.exchange.lock();
        if self.is_complete() {
            return;
        }
        exchange.headers = headers;
    }

    /// Appends a body chunk in arrival order.
    ///
    /// Returns `false` when the call is already finished, telling the caller
    /// to stop reading.
    pub fn on_content(&self, chunk: &[u8]) -> bool {
        let mut exchange = self.exchange.lock();
        if self.is_complete() {
            return false;
        }
        exchange.body.extend_from_slice(chunk);
        true
    }

    /// Finishes the call successfully. No-op if already finished.
    pub fn on_complete(&self) {
        if self.finish(None) {
            self.fire();
        }
    }

    /// Finishes the call with `cause`. No-op if already finished.
    pub fn on_error(&self, cause: BackendError) {
        if self.finish(Some(cause)) {
            self.fire();
        }
    }

    /// Attaches the completion handler.
    ///
    /// The first attachment wins and later ones are rejected. If the call is
    /// already finished the handler runs immediately on the calling thread.
    pub fn attach_handler<F>(&self, handler: F) -> bool
    where
        F: FnOnce(CallOutcome) + Send + 'static,
    {
        {
            let mut slot = self.handler.lock();
            if !matches!(*slot, HandlerSlot::Empty) {
                return false;
            }
            *slot = HandlerSlot::Attached(Box::new(handler));
        }
        self.fire();
        true
    }

    fn finish(&self, error: Option<BackendError>) -> bool {
        let mut exchange = self.exchange.lock();
        if self
            .complete
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        exchange.error = error;
        true
    }

    fn fire(&self) {
        if !self.is_complete() {
            return;
        }
        let handler = {
            let mut slot = self.handler.lock();
            match std::mem::replace(&mut *slot, HandlerSlot::Fired) {
                HandlerSlot::Attached(handler) => handler,
                other => {
                    *slot = other;
                    return;
                }
            }
        };
        handler(self.take_outcome());
    }

    fn take_outcome(&self) -> CallOutcome {
        let mut exchange = self.exchange.lock();
        CallOutcome {
            url: self.url.clone(),
            status: exchange.status,
            status_text: exchange.status_text.clone(),
            headers: exchange.headers.clone(),
            body: std::mem::take(&mut exchange.body).freeze(),
            error: exchange.error.take(),
        }
    }
}

impl std::fmt::Debug for CallResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallResult")
            .field("url", &self.url)
            .field("complete", &self.is_complete())
            .finish()
    }
}
