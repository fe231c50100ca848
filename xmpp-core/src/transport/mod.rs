//! The transport abstraction: a uniform interface over BOSH and WebSocket,
//! so the connection engine never has to know which one it's driving.

pub mod bosh;
pub mod websocket;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use minidom::Element;

use crate::error::Error;
use crate::session_store::SessionStore;

/// Something the transport handed back to the engine: a parsed stanza (or
/// stream-level element) plus, when available, the raw text it came from
/// (fed to the `rawInput` observability hook).
#[derive(Debug, Clone)]
pub struct Incoming {
    pub element: Element,
    pub raw: Option<String>,
}

/// What came out of a `recv()` call.
#[derive(Debug)]
pub enum TransportEvent {
    /// A stanza (or wrapped batch of stanzas, for BOSH) arrived.
    Stanza(Incoming),
    /// The transport closed without the engine having asked it to
    /// (§4.9: "closure of the WebSocket without a prior DISCONNECTING
    /// triggers CONNFAIL").
    ClosedUnexpectedly,
    /// A transient, recoverable transport-level error (surfaced through the
    /// protocol-error-handler table rather than failing the connection
    /// outright).
    RecoverableError { status_code: Option<u16>, message: String },
}

/// The outcome of handing the transport the very first response to inspect,
/// before the engine parses `stream:features` out of it generically.
#[derive(Debug)]
pub enum ConnectOutcome {
    /// Proceed to generic `stream:features` handling.
    Continue(Incoming),
    /// The body could not be parsed as XML at all.
    BadFormat,
    /// The server terminated the stream immediately, with an optional
    /// normalized condition string.
    Terminated(Option<String>),
}

/// Which wire protocol a transport speaks, for the protocol-error-handler
/// table (`addProtocolErrorHandler(protocol, statusCode, fn)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Bosh,
    WebSocket,
}

/// A connection's channel to the wire. Implemented by [`bosh::BoshTransport`]
/// and [`websocket::WebSocketTransport`].
#[async_trait]
pub trait Transport: Send {
    /// Which protocol this is, for the error-handler table.
    fn protocol(&self) -> Protocol;

    /// Opens the session (HTTP session creation for BOSH; socket + `<open/>`
    /// frame for WebSocket) and returns the first response to inspect.
    async fn connect(&mut self, domain: &str, route: Option<&str>) -> Result<ConnectOutcome, Error>;

    /// Queues an outgoing stanza.
    fn send(&mut self, stanza: Element);

    /// Requests a stream restart (a fresh `<stream:stream>` without tearing
    /// down the underlying transport), used after SASL success and after
    /// resource binding completes for some deployments.
    fn send_restart(&mut self);

    /// Tears the transport down. Idempotent.
    async fn disconnect(&mut self);

    /// Serializes `stanza` the way it would be sent on the wire, for the
    /// `xmlOutput`/`rawOutput` observability hooks — without enqueueing it.
    fn req_to_data(&self, stanza: &Element) -> String {
        stanza.to_string()
    }

    /// True iff nothing is queued or in flight.
    fn empty_queue(&self) -> bool;

    /// Called once per idle tick; flushes a batched request for BOSH, no-op
    /// for WebSocket.
    async fn on_idle(&mut self);

    /// Called when the 3000 ms forced-disconnect timer fires without a
    /// graceful `emptyQueue()` completion.
    fn on_disconnect_timeout(&mut self);

    /// Waits for the next event from the wire.
    async fn recv(&mut self) -> TransportEvent;

    /// Called by the engine when the post-connect response carried no
    /// `stream:features` at all, so the transport can abandon any requests
    /// it still has outstanding before the engine emits `NO_AUTH_MECH`.
    fn no_auth_received(&mut self);

    /// Requests the server shorten its hold time (BOSH `<body pause='N'/>`);
    /// a no-op for WebSocket, which has no equivalent concept.
    fn pause(&mut self, seconds: u32) {
        let _ = seconds;
    }

    /// Clears a prior `pause`.
    fn resume(&mut self) {}

    /// BOSH only: adopts an externally-created session's `sid`/`rid` so the
    /// next `connect()` resumes it instead of creating a new one.
    fn attach_session(&mut self, sid: &str, rid: u64) {
        let _ = (sid, rid);
    }

    /// BOSH only: reloads a saved `{jid, sid, rid}` from the session store.
    /// Returns the saved JID, or `None` if nothing was saved.
    fn restore_session(&mut self) -> Option<String> {
        None
    }

    /// BOSH only: overrides the `wait`/`hold` values requested at session
    /// creation. A no-op for WebSocket, which has no such negotiation.
    fn configure_bosh(&mut self, wait: u32, hold: u32) {
        let _ = (wait, hold);
    }

    /// BOSH only: sets the `Content-Type` and any extra headers (including a
    /// synthesized `Cookie` header, for `ConnectionOptions::cookies`) every
    /// request carries. A no-op for WebSocket, which has no per-request HTTP
    /// headers.
    fn configure_http(&mut self, content_type: String, custom_headers: HashMap<String, String>) {
        let _ = (content_type, custom_headers);
    }

    /// BOSH only: records the now-bound full JID, so a transport with a
    /// session store can persist `{jid, sid, rid}` together once the JID is
    /// known (session creation itself happens before bind resolves it). A
    /// no-op for WebSocket.
    fn note_session_jid(&mut self, jid: &str) {
        let _ = jid;
    }

    /// BOSH only: hands the transport a collaborator to persist (and, on
    /// `restore`, reload) `{jid, sid, rid}` with. `keepalive` mirrors
    /// `ConnectionOptions::keepalive`: when false the store is consulted by
    /// `restore_session` but never written to. A no-op for WebSocket, which
    /// has no session to persist.
    fn set_session_store(&mut self, store: Arc<dyn SessionStore>, keepalive: bool) {
        let _ = (store, keepalive);
    }
}
