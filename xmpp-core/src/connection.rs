//! The connection state machine (§4.4–§4.10): negotiates a session over
//! whichever [`Transport`] it is handed, drives SASL, binds a resource, and
//! then multiplexes stanza traffic through the handler/timed-handler
//! registries for as long as the caller keeps polling [`Connection::run`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use jid::{FullJid, Jid};
use minidom::{Element, ElementBuilder};
use sasl::{SaslContext, SaslMechanism};
use tokio::sync::mpsc;

use crate::config::{ConnectArgs, ConnectionOptions, Timeouts, WsScheme};
use crate::error::{condition, Error};
use crate::handler::{Handler, HandlerOptions, HandlerRef, TypeMatch};
use crate::ns;
use crate::sasl_driver;
use crate::stanza;
use crate::status::ConnectionStatus;
use crate::timed_handler::{TimedHandler, TimedHandlerRef};
use crate::session_store::SessionStore;
use crate::transport::bosh::BoshTransport;
use crate::transport::websocket::WebSocketTransport;
use crate::transport::{ConnectOutcome, Protocol, Transport, TransportEvent};

/// `(status, condition, triggering element)`, as registered with
/// `Connection::connect`/`attach`/`restore`.
pub type StatusCallback = Box<dyn FnMut(ConnectionStatus, Option<&str>, Option<&Element>) + Send>;

type OnIqSuccess = Box<dyn FnOnce(&Element) + Send>;
type OnIqError = Box<dyn FnOnce(Option<&Element>) + Send>;

/// A command a [`Handler`]/[`TimedHandler`] closure can enqueue without
/// holding a reference back to the [`Connection`] that owns it (the spec's
/// "handlers hold no reference back to the connection beyond the callback
/// closure" — here that closure instead holds a cheap channel endpoint).
enum EngineCommand {
    Send(Element),
    DeleteHandler(HandlerRef),
    DeleteTimedHandler(TimedHandlerRef),
}

/// A cloneable handle that lets a registered callback act on the
/// [`Connection`] that will eventually run it, without borrowing it.
#[derive(Clone)]
pub struct ConnectionHandle {
    tx: mpsc::UnboundedSender<EngineCommand>,
}

impl ConnectionHandle {
    /// Queues a stanza for the next idle tick / dataRecv drain.
    pub fn send(&self, stanza: Element) {
        let _ = self.tx.send(EngineCommand::Send(stanza));
    }

    /// Queues a handler for removal.
    pub fn delete_handler(&self, href: HandlerRef) {
        let _ = self.tx.send(EngineCommand::DeleteHandler(href));
    }

    /// Queues a timed handler for removal.
    pub fn delete_timed_handler(&self, href: TimedHandlerRef) {
        let _ = self.tx.send(EngineCommand::DeleteTimedHandler(href));
    }
}

/// What one [`Connection::run_once`] iteration accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    /// Keep polling.
    Continue,
    /// The connection finished disconnecting; stop polling.
    Disconnected,
}

/// The connection state machine: transport-agnostic session negotiation
/// (SASL or legacy auth, resource binding, an optional session iq) plus the
/// steady-state handler/timed-handler dispatch loop.
///
/// Owns every other piece of engine state exclusively (§3 "Lifecycle"); the
/// transport holds only a borrowed-for-the-call reference via its trait
/// methods, never a back-pointer into `Connection`.
pub struct Connection {
    options: ConnectionOptions,
    transport: Box<dyn Transport>,

    authzid: String,
    authcid: Option<String>,
    password: Option<String>,
    domain: String,
    requested_resource: Option<String>,
    jid_full: Option<FullJid>,

    connected: bool,
    authenticated: bool,
    disconnecting: bool,
    paused: bool,
    restored: bool,
    do_session: bool,

    unique_id: u64,

    handlers: Vec<(HandlerRef, Handler)>,
    pending_add_handlers: Vec<(HandlerRef, Handler)>,
    pending_remove_handlers: Vec<HandlerRef>,
    next_handler_id: u64,

    timed_handlers: Vec<(TimedHandlerRef, TimedHandler)>,
    pending_add_timed: Vec<(TimedHandlerRef, TimedHandler)>,
    pending_remove_timed: Vec<TimedHandlerRef>,
    next_timed_id: u64,

    protocol_error_handlers: HashMap<(Protocol, u16), Box<dyn FnMut(u16) + Send>>,
    pending_iq_cancellations: Vec<Arc<Mutex<Option<OnIqError>>>>,

    status_cb: Option<StatusCallback>,
    xml_input: Option<Box<dyn FnMut(&Element) + Send>>,
    xml_output: Option<Box<dyn FnMut(&Element) + Send>>,
    raw_input: Option<Box<dyn FnMut(&str) + Send>>,
    raw_output: Option<Box<dyn FnMut(&str) + Send>>,
    next_valid_rid: Option<Box<dyn FnMut(u64) + Send>>,

    timeouts: Timeouts,
    disconnect_deadline: Option<Instant>,
    idle_interval: tokio::time::Interval,

    engine_tx: mpsc::UnboundedSender<EngineCommand>,
    engine_rx: mpsc::UnboundedReceiver<EngineCommand>,
}

fn build_transport(service_url: &str, options: &ConnectionOptions) -> Box<dyn Transport> {
    let is_ws = matches!(options.protocol, WsScheme::Ws | WsScheme::Wss)
        || service_url.starts_with("ws://")
        || service_url.starts_with("wss://");
    if is_ws {
        Box::new(WebSocketTransport::new(service_url.to_string()))
    } else {
        Box::new(BoshTransport::new(service_url.to_string()))
    }
}

/// Returns the immediate children to dispatch as stanzas: a BOSH `<body/>`
/// wrapper's children, or the element itself for WebSocket (one stanza per
/// frame).
fn stanzas_in(element: &Element) -> Vec<&Element> {
    if element.name() == "body" && element.ns() == Some(ns::HTTPBIND) {
        element.children().collect()
    } else {
        vec![element]
    }
}

/// Finds `stream:features`, whether it arrived qualified or not (the
/// `hasFeatures` `??`-vs-`||` fix from §9: check both spellings).
fn find_stream_features(root: &Element) -> Option<&Element> {
    let is_features = |e: &Element| {
        (e.name() == "features" || e.name() == "stream:features") && e.ns() == Some(ns::STREAM)
    };
    if is_features(root) {
        return Some(root);
    }
    root.children().find(|c| is_features(c))
}

fn collect_mechanisms(features: &Element) -> Vec<String> {
    features
        .get_child("mechanisms", ns::SASL)
        .map(|m| m.children().filter(|c| c.name() == "mechanism").map(Element::text).collect())
        .unwrap_or_default()
}

/// Parses the `v=` field out of a SCRAM server-final message, decoding its
/// Base64 payload for comparison against the mechanism's stashed
/// server-signature.
fn parse_server_signature(decoded: &[u8]) -> Option<Vec<u8>> {
    let text = std::str::from_utf8(decoded).ok()?;
    let b64 = text.split(',').find_map(|field| field.strip_prefix("v="))?;
    BASE64.decode(b64).ok()
}

fn bind_conflict(stanza: &Element) -> bool {
    stanza
        .get_child("error", ns::JABBER_CLIENT)
        .or_else(|| stanza.children().find(|c| c.name() == "error"))
        .is_some_and(|e| e.has_child("conflict", ns::STANZAS))
}

impl Connection {
    /// Builds a connection to `service_url` (a BOSH HTTP endpoint or a
    /// `ws(s)://` WebSocket endpoint), selecting the transport from
    /// `options.protocol` if the URL scheme doesn't already pin one.
    pub fn new(service_url: impl Into<String>, options: ConnectionOptions) -> Connection {
        let service_url = service_url.into();
        let transport = build_transport(&service_url, &options);
        Connection::with_transport(transport, options)
    }

    /// Builds a connection driving an arbitrary [`Transport`] implementation
    /// directly, bypassing the BOSH-vs-WebSocket URL sniffing `new()` does.
    /// Exists for tests and callers that supply their own transport (a mock,
    /// or one the retrieval pack doesn't otherwise offer).
    pub fn with_transport(transport: Box<dyn Transport>, options: ConnectionOptions) -> Connection {
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let timeouts = Timeouts::default();
        Connection {
            idle_interval: tokio::time::interval(timeouts.idle_tick),
            options,
            transport,
            authzid: String::new(),
            authcid: None,
            password: None,
            domain: String::new(),
            requested_resource: None,
            jid_full: None,
            connected: false,
            authenticated: false,
            disconnecting: false,
            paused: false,
            restored: false,
            do_session: false,
            unique_id: 0,
            handlers: Vec::new(),
            pending_add_handlers: Vec::new(),
            pending_remove_handlers: Vec::new(),
            next_handler_id: 0,
            timed_handlers: Vec::new(),
            pending_add_timed: Vec::new(),
            pending_remove_timed: Vec::new(),
            next_timed_id: 0,
            protocol_error_handlers: HashMap::new(),
            pending_iq_cancellations: Vec::new(),
            status_cb: None,
            xml_input: None,
            xml_output: None,
            raw_input: None,
            raw_output: None,
            next_valid_rid: None,
            timeouts,
            disconnect_deadline: None,
            engine_tx,
            engine_rx,
        }
    }

    /// A cloneable handle callbacks can use to act on this connection
    /// without borrowing it.
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle { tx: self.engine_tx.clone() }
    }

    pub fn jid(&self) -> Option<&FullJid> {
        self.jid_full.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn is_disconnecting(&self) -> bool {
        self.disconnecting
    }

    pub fn set_xml_input(&mut self, cb: impl FnMut(&Element) + Send + 'static) {
        self.xml_input = Some(Box::new(cb));
    }

    pub fn set_xml_output(&mut self, cb: impl FnMut(&Element) + Send + 'static) {
        self.xml_output = Some(Box::new(cb));
    }

    pub fn set_raw_input(&mut self, cb: impl FnMut(&str) + Send + 'static) {
        self.raw_input = Some(Box::new(cb));
    }

    pub fn set_raw_output(&mut self, cb: impl FnMut(&str) + Send + 'static) {
        self.raw_output = Some(Box::new(cb));
    }

    pub fn set_next_valid_rid(&mut self, cb: impl FnMut(u64) + Send + 'static) {
        self.next_valid_rid = Some(Box::new(cb));
    }

    /// BOSH only: hands the transport a collaborator to persist `{jid, sid,
    /// rid}` with, so `restore()` has something to reload from. Persistence
    /// is gated on `options.keepalive`, matching the flag `restore()` itself
    /// checks. A no-op for a WebSocket-backed connection.
    pub fn set_session_store(&mut self, store: Arc<dyn SessionStore>) {
        self.transport.set_session_store(store, self.options.keepalive);
    }

    pub fn add_protocol_error_handler(
        &mut self,
        protocol: Protocol,
        status_code: u16,
        cb: impl FnMut(u16) + Send + 'static,
    ) {
        self.protocol_error_handlers.insert((protocol, status_code), Box::new(cb));
    }

    /// `reset()`: returns `uniqueId` to 0 and empties every handler list
    /// (§3 invariants).
    pub fn reset(&mut self) {
        self.unique_id = 0;
        self.handlers.clear();
        self.pending_add_handlers.clear();
        self.pending_remove_handlers.clear();
        self.timed_handlers.clear();
        self.pending_add_timed.clear();
        self.pending_remove_timed.clear();
        self.connected = false;
        self.authenticated = false;
        self.disconnecting = false;
        self.restored = false;
    }

    /// A version-4-UUID-shaped counter in spirit, a plain monotonic `u64`
    /// in fact (see DESIGN.md's Open Question decision): `reset()` is the
    /// only thing that rewinds it.
    pub fn get_unique_id(&mut self, suffix: Option<&str>) -> String {
        let id = self.unique_id;
        self.unique_id += 1;
        match suffix {
            Some(suffix) => format!("{}:{}", id, suffix),
            None => id.to_string(),
        }
    }

    pub fn add_handler(
        &mut self,
        options: HandlerOptions,
        user: bool,
        cb: impl FnMut(&Element) -> bool + Send + 'static,
    ) -> HandlerRef {
        let href = HandlerRef(self.next_handler_id);
        self.next_handler_id += 1;
        self.pending_add_handlers.push((href, Handler::new(options, user, cb)));
        href
    }

    pub fn delete_handler(&mut self, href: HandlerRef) {
        if let Some(idx) = self.pending_add_handlers.iter().position(|(r, _)| *r == href) {
            self.pending_add_handlers.remove(idx);
            return;
        }
        self.pending_remove_handlers.push(href);
    }

    pub fn add_timed_handler(
        &mut self,
        period: Duration,
        user: bool,
        cb: impl FnMut() -> bool + Send + 'static,
    ) -> TimedHandlerRef {
        let href = TimedHandlerRef(self.next_timed_id);
        self.next_timed_id += 1;
        self.pending_add_timed.push((href, TimedHandler::new(period, user, cb)));
        href
    }

    pub fn delete_timed_handler(&mut self, href: TimedHandlerRef) {
        if let Some(idx) = self.pending_add_timed.iter().position(|(r, _)| *r == href) {
            self.pending_add_timed.remove(idx);
            return;
        }
        self.pending_remove_timed.push(href);
    }

    /// Queues `stanza` for the transport; flushed at the next idle tick or
    /// `flush()`.
    pub fn send(&mut self, stanza: Element) {
        if let Some(cb) = &mut self.xml_output {
            cb(&stanza);
        }
        if let Some(cb) = &mut self.raw_output {
            let raw = self.transport.req_to_data(&stanza);
            cb(&raw);
        }
        self.transport.send(stanza);
    }

    /// `sendIQ`: ensures an id (the corrected `id.is_none() || id.is_empty()`
    /// guard per §9), registers a one-shot `iq[type=error|result]` handler,
    /// and arms a timeout that fires `on_error(None)` if nothing answers in
    /// time. Returns the id used.
    pub fn send_iq(
        &mut self,
        mut iq: Element,
        on_success: Option<OnIqSuccess>,
        on_error: Option<OnIqError>,
        timeout: Option<Duration>,
    ) -> String {
        let id = match iq.attr("id") {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = self.get_unique_id(Some("sendIQ"));
                iq.set_attr("id", Some(id.clone()));
                id
            }
        };
        self.send(iq);

        let success = Arc::new(Mutex::new(on_success));
        let error = Arc::new(Mutex::new(on_error));
        self.pending_iq_cancellations.push(error.clone());

        let opts = HandlerOptions {
            name: Some("iq".to_string()),
            types: TypeMatch::one_of([Some("error"), Some("result")]),
            id: Some(id.clone()),
            ..Default::default()
        };
        let href = self.add_handler(opts, false, move |el: &Element| {
            if el.attr("type") == Some("error") {
                let _ = success.lock().unwrap().take();
                if let Some(cb) = error.lock().unwrap().take() {
                    cb(Some(el));
                }
            } else {
                let _ = error.lock().unwrap().take();
                if let Some(cb) = success.lock().unwrap().take() {
                    cb(el);
                }
            }
            false
        });

        if let Some(timeout) = timeout {
            let error_for_timeout = self.pending_iq_cancellations.last().unwrap().clone();
            let handle = self.handle();
            self.add_timed_handler(timeout, false, move || {
                if let Some(cb) = error_for_timeout.lock().unwrap().take() {
                    cb(None);
                    handle.delete_handler(href);
                }
                false
            });
        }

        id
    }

    /// `sendPresence`: like `sendIQ` but matches any `presence` (no `type`
    /// filter), dispatching `on_success` for non-error and `on_error` for
    /// `type='error'`.
    pub fn send_presence(
        &mut self,
        mut presence: Element,
        on_success: Option<OnIqSuccess>,
        on_error: Option<OnIqError>,
        timeout: Option<Duration>,
    ) -> String {
        let id = match presence.attr("id") {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = self.get_unique_id(Some("sendPresence"));
                presence.set_attr("id", Some(id.clone()));
                id
            }
        };
        self.send(presence);

        let success = Arc::new(Mutex::new(on_success));
        let error = Arc::new(Mutex::new(on_error));
        self.pending_iq_cancellations.push(error.clone());

        let opts = HandlerOptions {
            name: Some("presence".to_string()),
            id: Some(id.clone()),
            ..Default::default()
        };
        let href = self.add_handler(opts, false, move |el: &Element| {
            if el.attr("type") == Some("error") {
                let _ = success.lock().unwrap().take();
                if let Some(cb) = error.lock().unwrap().take() {
                    cb(Some(el));
                }
            } else {
                let _ = error.lock().unwrap().take();
                if let Some(cb) = success.lock().unwrap().take() {
                    cb(el);
                }
            }
            false
        });

        if let Some(timeout) = timeout {
            let error_for_timeout = self.pending_iq_cancellations.last().unwrap().clone();
            let handle = self.handle();
            self.add_timed_handler(timeout, false, move || {
                if let Some(cb) = error_for_timeout.lock().unwrap().take() {
                    cb(None);
                    handle.delete_handler(href);
                }
                false
            });
        }

        id
    }

    pub fn pause(&mut self) {
        self.paused = true;
        self.transport.pause(60);
    }

    pub fn resume(&mut self) {
        self.paused = false;
        self.transport.resume();
    }

    /// Cancels the pending idle tick and runs its body immediately.
    pub async fn flush(&mut self) {
        self.drain_engine_commands();
        self.idle_tick().await;
        self.idle_interval.reset();
    }

    /// Merges `options.custom_headers` with a synthesized `Cookie` header
    /// built from `options.cookies`, for BOSH's `configure_http`.
    fn request_headers(&self) -> HashMap<String, String> {
        let mut headers = self.options.custom_headers.clone();
        if !self.options.cookies.is_empty() {
            let cookie = self
                .options
                .cookies
                .iter()
                .map(|(name, c)| format!("{}={}", name, c.value))
                .collect::<Vec<_>>()
                .join("; ");
            headers.insert("Cookie".to_string(), cookie);
        }
        headers
    }

    // ---- connect / attach / restore -------------------------------------

    /// `connect(jid, password, statusCallback, ...)`: runs the full
    /// handshake (transport connect → SASL or legacy auth → bind → session)
    /// to completion before returning. On success the connection is in the
    /// `Connected` state and ready for `run()`.
    pub async fn connect(
        &mut self,
        jid: &str,
        password: impl Into<String>,
        status_cb: StatusCallback,
        args: ConnectArgs,
    ) -> Result<(), Error> {
        self.reset();
        self.status_cb = Some(status_cb);

        let parsed: Jid = jid.parse()?;
        self.authzid = parsed.to_bare().to_string();
        self.authcid = args.authcid.clone().or_else(|| parsed.node().map(str::to_owned));
        self.domain = parsed.domain().to_string();
        self.requested_resource = parsed.resource().map(str::to_owned);
        self.password = Some(password.into());

        let hold = if self.options.sync { 0 } else { args.hold };
        self.transport.configure_bosh(args.wait, hold);
        self.transport.configure_http(self.options.content_type.clone(), self.request_headers());
        self.change_connect_status(ConnectionStatus::Connecting, None, None);

        let outcome = self.transport.connect(&self.domain, args.route.as_deref()).await?;
        self.connect_cb(outcome).await
    }

    /// BOSH-only: resumes a session an external party created, skipping
    /// SASL/bind entirely.
    pub async fn attach(
        &mut self,
        jid: &str,
        sid: impl Into<String>,
        rid: u64,
        status_cb: StatusCallback,
    ) -> Result<(), Error> {
        self.reset();
        self.status_cb = Some(status_cb);

        let full: FullJid = jid.parse()?;
        self.domain = full.domain().to_string();
        self.authzid = full.to_bare().to_string();
        self.jid_full = Some(full);

        if let Some(cb) = &mut self.next_valid_rid {
            cb(rid);
        }
        self.transport.attach_session(&sid.into(), rid);
        self.transport.configure_http(self.options.content_type.clone(), self.request_headers());

        self.change_connect_status(ConnectionStatus::Connecting, None, None);
        let outcome = self.transport.connect(&self.domain, None).await?;
        self.finish_attach(outcome).await
    }

    /// BOSH-only: reloads `{jid, sid, rid}` from the session store and
    /// resumes, as `attach` would. Requires `options.keepalive`.
    pub async fn restore(&mut self, status_cb: StatusCallback) -> Result<(), Error> {
        if !self.options.keepalive {
            return Err(Error::InvalidState);
        }
        let saved_jid = self.transport.restore_session().ok_or(Error::InvalidState)?;

        self.reset();
        self.status_cb = Some(status_cb);

        let full: FullJid = saved_jid.parse()?;
        self.domain = full.domain().to_string();
        self.authzid = full.to_bare().to_string();
        self.jid_full = Some(full);
        self.transport.configure_http(self.options.content_type.clone(), self.request_headers());

        self.change_connect_status(ConnectionStatus::Connecting, None, None);
        let outcome = self.transport.connect(&self.domain, None).await?;
        self.restored = true;
        self.finish_attach(outcome).await
    }

    async fn finish_attach(&mut self, outcome: ConnectOutcome) -> Result<(), Error> {
        match outcome {
            ConnectOutcome::Continue(_) => {
                self.connected = true;
                self.authenticated = true;
                self.change_connect_status(ConnectionStatus::Attached, None, None);
                Ok(())
            }
            ConnectOutcome::BadFormat => {
                self.change_connect_status(ConnectionStatus::ConnFail, Some(condition::BAD_FORMAT), None);
                Err(Error::Protocol(condition::BAD_FORMAT))
            }
            ConnectOutcome::Terminated(cond) => {
                self.change_connect_status(
                    ConnectionStatus::ConnFail,
                    Some(cond.as_deref().unwrap_or(condition::UNKNOWN)),
                    None,
                );
                Err(Error::Protocol(condition::UNKNOWN))
            }
        }
    }

    // ---- handshake internals ---------------------------------------------

    async fn connect_cb(&mut self, outcome: ConnectOutcome) -> Result<(), Error> {
        match outcome {
            ConnectOutcome::BadFormat => {
                self.change_connect_status(ConnectionStatus::ConnFail, Some(condition::BAD_FORMAT), None);
                self.disconnect(None).await;
                Err(Error::Protocol(condition::BAD_FORMAT))
            }
            ConnectOutcome::Terminated(cond) => {
                self.change_connect_status(
                    ConnectionStatus::ConnFail,
                    Some(cond.as_deref().unwrap_or(condition::UNKNOWN)),
                    None,
                );
                self.finish_disconnect().await;
                Err(Error::Protocol(condition::UNKNOWN))
            }
            ConnectOutcome::Continue(incoming) => {
                if let Some(cb) = &mut self.xml_input {
                    cb(&incoming.element);
                }
                self.connected = true;

                match find_stream_features(&incoming.element).cloned() {
                    None => {
                        self.transport.no_auth_received();
                        self.change_connect_status(ConnectionStatus::ConnFail, Some(condition::NO_AUTH_MECH), None);
                        self.disconnect(None).await;
                        Err(Error::Protocol(condition::NO_AUTH_MECH))
                    }
                    Some(features) => {
                        let offered = collect_mechanisms(&features);
                        self.authenticate(offered, features).await
                    }
                }
            }
        }
    }

    async fn authenticate(&mut self, offered: Vec<String>, features: Element) -> Result<(), Error> {
        self.change_connect_status(ConnectionStatus::Authenticating, None, None);

        let allowed = self.options.mechanisms.clone();
        let mechanism = sasl_driver::pick_mechanism(&offered, allowed.as_deref(), &*self);

        match mechanism {
            Some(mut mechanism) => {
                mechanism.on_start(&*self);
                let name = mechanism.name();
                let stanza = if mechanism.client_first() {
                    let payload = mechanism.on_challenge(&*self, None)?;
                    ElementBuilder::new("auth", [("xmlns", ns::SASL), ("mechanism", name)].as_slice())
                        .t(BASE64.encode(payload))
                        .tree()
                } else {
                    ElementBuilder::new("auth", [("xmlns", ns::SASL), ("mechanism", name)].as_slice()).tree()
                };
                self.send_now(stanza).await;
                self.sasl_round_trip(mechanism).await
            }
            None if offered.is_empty() && features.has_child("auth", ns::IQ_AUTH_FEATURE) => {
                self.legacy_auth().await
            }
            None => {
                self.change_connect_status(ConnectionStatus::ConnFail, Some(condition::NO_AUTH_MECH), None);
                self.disconnect(None).await;
                Err(Error::Protocol(condition::NO_AUTH_MECH))
            }
        }
    }

    async fn sasl_round_trip(&mut self, mut mechanism: Box<dyn SaslMechanism>) -> Result<(), Error> {
        loop {
            let incoming = match self.transport.recv().await {
                TransportEvent::Stanza(incoming) => incoming,
                TransportEvent::ClosedUnexpectedly => {
                    self.change_connect_status(ConnectionStatus::ConnFail, Some(condition::UNKNOWN), None);
                    return Err(Error::Protocol(condition::UNKNOWN));
                }
                TransportEvent::RecoverableError { .. } => {
                    self.change_connect_status(ConnectionStatus::ConnFail, Some(condition::BAD_FORMAT), None);
                    return Err(Error::Protocol(condition::BAD_FORMAT));
                }
            };
            if let Some(cb) = &mut self.xml_input {
                cb(&incoming.element);
            }

            for stanza in stanzas_in(&incoming.element) {
                if stanza.ns() != Some(ns::SASL) {
                    continue;
                }
                match stanza.name() {
                    "challenge" => {
                        let decoded = BASE64
                            .decode(stanza.text().trim())
                            .map_err(|_| Error::Protocol(condition::BAD_FORMAT))?;
                        let response = mechanism.on_challenge(&*self, Some(&decoded))?;
                        let el = ElementBuilder::new("response", [("xmlns", ns::SASL)].as_slice())
                            .t(BASE64.encode(response))
                            .tree();
                        self.send_now(el).await;
                    }
                    "success" => {
                        let text = stanza.text();
                        let decoded = if text.trim().is_empty() {
                            Vec::new()
                        } else {
                            BASE64.decode(text.trim()).map_err(|_| Error::Protocol(condition::BAD_FORMAT))?
                        };
                        if let Some(expected) = mechanism.server_signature() {
                            if parse_server_signature(&decoded).as_deref() != Some(expected) {
                                mechanism.on_failure();
                                self.change_connect_status(ConnectionStatus::AuthFail, None, Some(stanza));
                                return Err(Error::Protocol("server-signature-mismatch"));
                            }
                        }
                        mechanism.on_success(&*self, &decoded);
                        self.transport.send_restart();
                        self.transport.on_idle().await;
                        return self.after_sasl_success().await;
                    }
                    "failure" => {
                        mechanism.on_failure();
                        let reported = stanza.children().next().map(|c| c.name().to_string());
                        self.change_connect_status(ConnectionStatus::AuthFail, reported.as_deref(), Some(stanza));
                        return Err(Error::Protocol("auth-failure"));
                    }
                    _ => {}
                }
            }
        }
    }

    async fn after_sasl_success(&mut self) -> Result<(), Error> {
        self.authenticated = true;
        loop {
            match self.transport.recv().await {
                TransportEvent::Stanza(incoming) => {
                    if let Some(cb) = &mut self.xml_input {
                        cb(&incoming.element);
                    }
                    if let Some(features) = find_stream_features(&incoming.element).cloned() {
                        return self.bind(features).await;
                    }
                }
                TransportEvent::ClosedUnexpectedly => {
                    self.change_connect_status(ConnectionStatus::ConnFail, Some(condition::UNKNOWN), None);
                    return Err(Error::Protocol(condition::UNKNOWN));
                }
                TransportEvent::RecoverableError { .. } => {
                    self.change_connect_status(ConnectionStatus::ConnFail, Some(condition::BAD_FORMAT), None);
                    return Err(Error::Protocol(condition::BAD_FORMAT));
                }
            }
        }
    }

    async fn bind(&mut self, features: Element) -> Result<(), Error> {
        if !features.has_child("bind", ns::BIND) {
            self.change_connect_status(ConnectionStatus::AuthFail, None, None);
            return Err(Error::Protocol("no-bind"));
        }
        self.do_session = features.has_child("session", ns::SESSION);

        let mut bind_tree = ElementBuilder::new("iq", [("type", "set"), ("id", "_bind_auth_2")].as_slice())
            .c("bind", [("xmlns", ns::BIND)].as_slice());
        if let Some(resource) = self.requested_resource.clone() {
            bind_tree = bind_tree.c("resource", ()).t(resource).up();
        }
        self.send_now(bind_tree.tree()).await;

        loop {
            let incoming = match self.transport.recv().await {
                TransportEvent::Stanza(incoming) => incoming,
                TransportEvent::ClosedUnexpectedly => {
                    self.change_connect_status(ConnectionStatus::ConnFail, Some(condition::UNKNOWN), None);
                    return Err(Error::Protocol(condition::UNKNOWN));
                }
                TransportEvent::RecoverableError { .. } => continue,
            };
            if let Some(cb) = &mut self.xml_input {
                cb(&incoming.element);
            }
            for stanza in stanzas_in(&incoming.element) {
                if stanza.name() != "iq" || stanza.attr("id") != Some("_bind_auth_2") {
                    continue;
                }
                if stanza.attr("type") == Some("error") {
                    let cond = bind_conflict(stanza).then_some(condition::CONFLICT);
                    self.change_connect_status(ConnectionStatus::AuthFail, cond, Some(stanza));
                    return Err(Error::Protocol(cond.unwrap_or("bind-error")));
                }
                let jid_text = stanza
                    .get_child("bind", ns::BIND)
                    .and_then(|b| b.get_child("jid", ns::BIND))
                    .map(Element::text)
                    .unwrap_or_default();
                self.jid_full = Some(jid_text.parse()?);
                self.transport.note_session_jid(&jid_text);
                return if self.do_session {
                    self.establish_session().await
                } else {
                    self.change_connect_status(ConnectionStatus::Connected, None, None);
                    Ok(())
                };
            }
        }
    }

    async fn establish_session(&mut self) -> Result<(), Error> {
        let session_iq = ElementBuilder::new("iq", [("type", "set"), ("id", "_session_auth_2")].as_slice())
            .c("session", [("xmlns", ns::SESSION)].as_slice())
            .up()
            .tree();
        self.send_now(session_iq).await;

        loop {
            let incoming = match self.transport.recv().await {
                TransportEvent::Stanza(incoming) => incoming,
                TransportEvent::ClosedUnexpectedly => {
                    self.change_connect_status(ConnectionStatus::ConnFail, Some(condition::UNKNOWN), None);
                    return Err(Error::Protocol(condition::UNKNOWN));
                }
                TransportEvent::RecoverableError { .. } => continue,
            };
            if let Some(cb) = &mut self.xml_input {
                cb(&incoming.element);
            }
            for stanza in stanzas_in(&incoming.element) {
                if stanza.name() != "iq" || stanza.attr("id") != Some("_session_auth_2") {
                    continue;
                }
                if stanza.attr("type") == Some("error") {
                    self.change_connect_status(ConnectionStatus::AuthFail, None, Some(stanza));
                    return Err(Error::Protocol("session-error"));
                }
                self.change_connect_status(ConnectionStatus::Connected, None, None);
                return Ok(());
            }
        }
    }

    async fn legacy_auth(&mut self) -> Result<(), Error> {
        let Some(node) = self.authcid.clone() else {
            self.change_connect_status(ConnectionStatus::AuthFail, Some(condition::BAD_NON_ANON_JID), None);
            return Err(Error::Protocol(condition::BAD_NON_ANON_JID));
        };

        let probe = ElementBuilder::new("iq", [("type", "get"), ("id", "_auth_1")].as_slice())
            .c("query", [("xmlns", ns::JABBER_IQ_AUTH)].as_slice())
            .c("username", ())
            .t(node.clone())
            .up()
            .up()
            .tree();
        self.send_now(probe).await;

        loop {
            let incoming = match self.transport.recv().await {
                TransportEvent::Stanza(incoming) => incoming,
                TransportEvent::ClosedUnexpectedly => {
                    self.change_connect_status(ConnectionStatus::ConnFail, Some(condition::UNKNOWN), None);
                    return Err(Error::Protocol(condition::UNKNOWN));
                }
                TransportEvent::RecoverableError { .. } => continue,
            };
            if let Some(cb) = &mut self.xml_input {
                cb(&incoming.element);
            }
            for stanza in stanzas_in(&incoming.element) {
                if stanza.name() != "iq" || stanza.attr("id") != Some("_auth_1") {
                    continue;
                }
                if stanza.attr("type") == Some("error") {
                    self.change_connect_status(ConnectionStatus::AuthFail, None, Some(stanza));
                    return Err(Error::Protocol("auth-failure"));
                }
                return self.legacy_auth_submit(node).await;
            }
        }
    }

    async fn legacy_auth_submit(&mut self, node: String) -> Result<(), Error> {
        let password = self.password.clone().unwrap_or_default();
        let resource = self.requested_resource.clone().unwrap_or_else(|| "strophe".to_string());

        let submit = ElementBuilder::new("iq", [("type", "set"), ("id", "_auth_2")].as_slice())
            .c("query", [("xmlns", ns::JABBER_IQ_AUTH)].as_slice())
            .c("username", ())
            .t(node.clone())
            .up()
            .c("password", ())
            .t(password)
            .up()
            .c("resource", ())
            .t(resource.clone())
            .up()
            .up()
            .tree();
        self.send_now(submit).await;

        loop {
            let incoming = match self.transport.recv().await {
                TransportEvent::Stanza(incoming) => incoming,
                TransportEvent::ClosedUnexpectedly => {
                    self.change_connect_status(ConnectionStatus::ConnFail, Some(condition::UNKNOWN), None);
                    return Err(Error::Protocol(condition::UNKNOWN));
                }
                TransportEvent::RecoverableError { .. } => continue,
            };
            if let Some(cb) = &mut self.xml_input {
                cb(&incoming.element);
            }
            for stanza in stanzas_in(&incoming.element) {
                if stanza.name() != "iq" || stanza.attr("id") != Some("_auth_2") {
                    continue;
                }
                if stanza.attr("type") == Some("error") {
                    self.change_connect_status(ConnectionStatus::AuthFail, None, Some(stanza));
                    return Err(Error::Protocol("auth-failure"));
                }
                self.authenticated = true;
                if let Ok(full) = FullJid::from_parts(Some(node.as_str()), &self.domain, resource.as_str()) {
                    let full_text = full.to_string();
                    self.jid_full = Some(full);
                    self.transport.note_session_jid(&full_text);
                }
                self.change_connect_status(ConnectionStatus::Connected, None, None);
                return Ok(());
            }
        }
    }

    /// Sends `stanza` and forces it onto the wire immediately — used during
    /// the handshake, before the idle-tick loop is running.
    async fn send_now(&mut self, stanza: Element) {
        if let Some(cb) = &mut self.xml_output {
            cb(&stanza);
        }
        if let Some(cb) = &mut self.raw_output {
            let raw = self.transport.req_to_data(&stanza);
            cb(&raw);
        }
        self.transport.send(stanza);
        self.transport.on_idle().await;
    }

    // ---- steady-state run loop -------------------------------------------

    /// Drives the connection until it disconnects.
    pub async fn run(&mut self) -> Result<(), Error> {
        loop {
            if self.run_once().await? == RunEvent::Disconnected {
                return Ok(());
            }
        }
    }

    /// One iteration of the idle-tick / dataRecv loop (§4.5). Awaits
    /// whichever comes first: the 100 ms idle tick, or the next transport
    /// event.
    pub async fn run_once(&mut self) -> Result<RunEvent, Error> {
        if !self.connected && !self.disconnecting {
            return Ok(RunEvent::Disconnected);
        }

        tokio::select! {
            _ = self.idle_interval.tick() => {
                self.drain_engine_commands();
                self.idle_tick().await;
            }
            event = self.transport.recv() => {
                self.handle_transport_event(event).await;
            }
        }

        if self.disconnecting {
            if let Some(deadline) = self.disconnect_deadline {
                if Instant::now() >= deadline {
                    self.change_connect_status(ConnectionStatus::ConnTimeout, None, None);
                    self.transport.on_disconnect_timeout();
                    self.finish_disconnect().await;
                    return Ok(RunEvent::Disconnected);
                }
            }
        }

        if self.connected || self.disconnecting {
            Ok(RunEvent::Continue)
        } else {
            Ok(RunEvent::Disconnected)
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Stanza(incoming) => self.data_recv(incoming.element, incoming.raw).await,
            TransportEvent::ClosedUnexpectedly => {
                if !self.disconnecting {
                    self.change_connect_status(ConnectionStatus::ConnFail, Some(condition::UNKNOWN), None);
                }
                self.finish_disconnect().await;
            }
            TransportEvent::RecoverableError { status_code, message } => {
                self.route_protocol_error(status_code, &message);
            }
        }
    }

    /// `dataRecv(req, rawOpt)`, §4.5 steps 1–6.
    async fn data_recv(&mut self, element: Element, raw: Option<String>) {
        if let Some(cb) = &mut self.xml_input {
            cb(&element);
        }
        if let (Some(cb), Some(raw)) = (&mut self.raw_input, &raw) {
            cb(raw);
        }

        self.drain_engine_commands();
        self.drain_pending_remove_handlers();
        self.promote_pending_add_handlers();

        if self.disconnecting && self.transport.empty_queue() {
            self.finish_disconnect().await;
            return;
        }

        let stanzas = stanzas_in(&element);

        for &stanza in &stanzas {
            if stanza.attr("type") == Some("terminate") {
                let cond = stanza
                    .attr("condition")
                    .map(str::to_string)
                    .or_else(|| bind_conflict(stanza).then(|| condition::CONFLICT.to_string()));
                self.change_connect_status(
                    ConnectionStatus::ConnFail,
                    Some(cond.as_deref().unwrap_or(condition::UNKNOWN)),
                    Some(stanza),
                );
                self.finish_disconnect().await;
                return;
            }
        }

        let snapshot: Vec<HandlerRef> = self.handlers.iter().map(|(r, _)| *r).collect();
        let authenticated = self.authenticated;
        let disconnecting = self.disconnecting;
        for &stanza in &stanzas {
            for href in &snapshot {
                let Some(idx) = self.handlers.iter().position(|(r, _)| r == href) else {
                    continue;
                };
                let may_run = {
                    let (_, handler) = &self.handlers[idx];
                    handler.is_match(stanza) && (!handler.user || (authenticated && !disconnecting))
                };
                if !may_run {
                    continue;
                }
                let keep = {
                    let (_, handler) = &mut self.handlers[idx];
                    handler.run(stanza)
                };
                if !keep {
                    self.handlers.remove(idx);
                }
            }
        }
    }

    fn promote_pending_add_handlers(&mut self) {
        self.handlers.append(&mut self.pending_add_handlers);
    }

    fn drain_pending_remove_handlers(&mut self) {
        if self.pending_remove_handlers.is_empty() {
            return;
        }
        let removed: Vec<HandlerRef> = self.pending_remove_handlers.drain(..).collect();
        self.handlers.retain(|(r, _)| !removed.contains(r));
    }

    fn promote_pending_add_timed(&mut self) {
        self.timed_handlers.append(&mut self.pending_add_timed);
    }

    fn drain_pending_remove_timed(&mut self) {
        if self.pending_remove_timed.is_empty() {
            return;
        }
        let removed: Vec<TimedHandlerRef> = self.pending_remove_timed.drain(..).collect();
        self.timed_handlers.retain(|(r, _)| !removed.contains(r));
    }

    fn drain_engine_commands(&mut self) {
        while let Ok(cmd) = self.engine_rx.try_recv() {
            match cmd {
                EngineCommand::Send(stanza) => self.send(stanza),
                EngineCommand::DeleteHandler(href) => self.delete_handler(href),
                EngineCommand::DeleteTimedHandler(href) => self.delete_timed_handler(href),
            }
        }
    }

    /// The 100 ms idle tick: promote/drain timed-handler pending lists, fire
    /// the ones that are due, then let the transport flush.
    async fn idle_tick(&mut self) {
        self.promote_pending_add_timed();
        self.drain_pending_remove_timed();

        let now = Instant::now();
        let authenticated = self.authenticated;
        let due: Vec<TimedHandlerRef> = self
            .timed_handlers
            .iter()
            .filter(|(_, h)| h.is_due(now) && (authenticated || !h.user))
            .map(|(r, _)| *r)
            .collect();
        for href in due {
            let Some(idx) = self.timed_handlers.iter().position(|(r, _)| *r == href) else {
                continue;
            };
            let keep = self.timed_handlers[idx].1.fire(now);
            if !keep {
                self.timed_handlers.remove(idx);
            }
        }

        self.transport.on_idle().await;
    }

    fn route_protocol_error(&mut self, status_code: Option<u16>, message: &str) {
        let protocol = self.transport.protocol();
        let handled = status_code.is_some_and(|code| {
            if let Some(cb) = self.protocol_error_handlers.get_mut(&(protocol, code)) {
                cb(code);
                true
            } else {
                false
            }
        });
        if !handled {
            log::warn!("unhandled transport error ({:?}): {}", protocol, message);
        }
    }

    fn change_connect_status(&mut self, status: ConnectionStatus, condition: Option<&str>, elem: Option<&Element>) {
        log::debug!("connection status -> {:?} ({:?})", status, condition);
        if let Some(cb) = &mut self.status_cb {
            cb(status, condition, elem);
        }
    }

    /// `disconnect(reason)`: idempotent. If connected, sends unavailable
    /// presence (if authenticated), arms the forced-disconnect timeout, and
    /// asks the transport to tear down; otherwise finishes immediately.
    pub async fn disconnect(&mut self, reason: Option<&str>) {
        if self.disconnecting {
            return;
        }
        if !self.connected {
            self.finish_disconnect().await;
            return;
        }

        self.change_connect_status(ConnectionStatus::Disconnecting, reason, None);
        self.disconnecting = true;

        if self.authenticated {
            let unavailable = stanza::presence(Some("unavailable")).tree();
            self.send(unavailable);
        }

        self.disconnect_deadline = Some(Instant::now() + self.timeouts.disconnect_timeout);
        self.transport.disconnect().await;
    }

    /// §9 Open Question, decided: forced disconnect invokes every still-
    /// pending `sendIQ`/`sendPresence` error callback with `None`, rather
    /// than silently dropping them.
    async fn finish_disconnect(&mut self) {
        self.transport.disconnect().await;
        self.connected = false;
        self.authenticated = false;
        self.disconnecting = false;
        self.disconnect_deadline = None;
        self.change_connect_status(ConnectionStatus::Disconnected, None, None);

        for cell in self.pending_iq_cancellations.drain(..) {
            if let Some(cb) = cell.lock().unwrap().take() {
                cb(None);
            }
        }

        self.handlers.clear();
        self.pending_add_handlers.clear();
        self.pending_remove_handlers.clear();
        self.timed_handlers.clear();
        self.pending_add_timed.clear();
        self.pending_remove_timed.clear();
    }
}

impl SaslContext for Connection {
    fn authzid(&self) -> &str {
        &self.authzid
    }

    fn authcid(&self) -> Option<&str> {
        self.authcid.as_deref()
    }

    fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    fn domain(&self) -> &str {
        &self.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    /// A transport double that never produces traffic; enough to exercise
    /// handler bookkeeping and the disconnect-when-not-connected path
    /// without a real socket or HTTP client.
    struct NullTransport {
        disconnect_called: StdArc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for NullTransport {
        fn protocol(&self) -> Protocol {
            Protocol::WebSocket
        }

        async fn connect(&mut self, _domain: &str, _route: Option<&str>) -> Result<ConnectOutcome, Error> {
            unreachable!("tests that use NullTransport never call connect()")
        }

        fn send(&mut self, _stanza: Element) {}

        fn send_restart(&mut self) {}

        async fn disconnect(&mut self) {
            self.disconnect_called.store(true, Ordering::SeqCst);
        }

        fn empty_queue(&self) -> bool {
            true
        }

        async fn on_idle(&mut self) {}

        fn on_disconnect_timeout(&mut self) {}

        async fn recv(&mut self) -> TransportEvent {
            std::future::pending().await
        }

        fn no_auth_received(&mut self) {}
    }

    fn connection() -> Connection {
        Connection::new("ws://example.org/xmpp", ConnectionOptions::default())
    }

    #[test]
    fn unique_id_is_monotonic_and_resets() {
        let mut conn = connection();
        assert_eq!(conn.get_unique_id(None), "0");
        assert_eq!(conn.get_unique_id(None), "1");
        assert_eq!(conn.get_unique_id(Some("x")), "2:x");
        conn.reset();
        assert_eq!(conn.get_unique_id(None), "0");
    }

    #[test]
    fn delete_handler_removes_from_pending_add_atomically() {
        let mut conn = connection();
        let href = conn.add_handler(HandlerOptions::default(), true, |_| true);
        assert_eq!(conn.pending_add_handlers.len(), 1);
        conn.delete_handler(href);
        assert!(conn.pending_add_handlers.is_empty());
        assert!(conn.pending_remove_handlers.is_empty());
    }

    #[test]
    fn delete_handler_after_promotion_queues_pending_remove() {
        let mut conn = connection();
        let href = conn.add_handler(HandlerOptions::default(), true, |_| true);
        conn.promote_pending_add_handlers();
        conn.delete_handler(href);
        assert_eq!(conn.pending_remove_handlers, vec![href]);
    }

    #[tokio::test]
    async fn disconnect_when_not_connected_finishes_immediately() {
        let disconnect_called = StdArc::new(AtomicBool::new(false));
        let mut conn = connection();
        conn.transport = Box::new(NullTransport { disconnect_called: disconnect_called.clone() });

        conn.disconnect(Some("bye")).await;

        assert!(disconnect_called.load(Ordering::SeqCst));
        assert!(!conn.connected);
        assert!(!conn.disconnecting);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_while_in_progress() {
        let disconnect_called = StdArc::new(AtomicBool::new(false));
        let mut conn = connection();
        conn.transport = Box::new(NullTransport { disconnect_called: disconnect_called.clone() });
        conn.connected = true;
        conn.authenticated = false;

        conn.disconnect(Some("bye")).await;
        assert!(conn.disconnecting);
        let deadline_after_first = conn.disconnect_deadline;

        conn.disconnect(Some("bye again")).await;
        assert_eq!(conn.disconnect_deadline, deadline_after_first);
    }

    #[tokio::test]
    async fn send_iq_without_response_times_out_with_none() {
        let mut conn = connection();
        conn.connected = true;
        conn.authenticated = true;

        let fired = StdArc::new(AtomicBool::new(false));
        let fired_check = fired.clone();
        let iq = stanza::iq("get", "").tree();
        conn.send_iq(
            iq,
            None,
            Some(Box::new(move |resp: Option<&Element>| {
                assert!(resp.is_none());
                fired_check.store(true, Ordering::SeqCst);
            })),
            Some(Duration::from_millis(1)),
        );

        conn.promote_pending_add_timed();
        tokio::time::sleep(Duration::from_millis(5)).await;
        conn.idle_tick().await;

        assert!(fired.load(Ordering::SeqCst));
    }

    /// Regression test: a result that arrives before the timeout must fire
    /// `on_success` exactly once and must not also fire `on_error` once the
    /// timeout's own idle tick runs afterwards.
    #[tokio::test]
    async fn send_iq_success_before_timeout_does_not_also_fire_error() {
        let mut conn = connection();
        conn.connected = true;
        conn.authenticated = true;

        let success_calls = StdArc::new(AtomicUsize::new(0));
        let error_calls = StdArc::new(AtomicUsize::new(0));
        let success_check = success_calls.clone();
        let error_check = error_calls.clone();

        let id = conn.send_iq(
            stanza::iq("get", "").tree(),
            Some(Box::new(move |_resp: &Element| {
                success_check.fetch_add(1, Ordering::SeqCst);
            })),
            Some(Box::new(move |_resp: Option<&Element>| {
                error_check.fetch_add(1, Ordering::SeqCst);
            })),
            Some(Duration::from_millis(1)),
        );

        let result = stanza::iq("result", &id).tree();
        conn.data_recv(result, None).await;

        assert_eq!(success_calls.load(Ordering::SeqCst), 1);
        assert_eq!(error_calls.load(Ordering::SeqCst), 0);

        conn.promote_pending_add_timed();
        tokio::time::sleep(Duration::from_millis(5)).await;
        conn.idle_tick().await;

        assert_eq!(success_calls.load(Ordering::SeqCst), 1);
        assert_eq!(error_calls.load(Ordering::SeqCst), 0);
    }
}
