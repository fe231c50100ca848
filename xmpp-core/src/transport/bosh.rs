use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use minidom::{Element, ElementBuilder};
use reqwest::Client;
use tokio::sync::mpsc;

use crate::error::Error;
use crate::ns;
use crate::session_store::{SavedSession, SessionStore};

use super::{ConnectOutcome, Incoming, Protocol, Transport, TransportEvent};

/// One outstanding BOSH HTTP request: enough state to retry it and to pair
/// its response back to the request that produced it.
struct BoshRequest {
    id: u64,
    rid: u64,
    sends: u32,
}

/// Request/response pairing over long-polling HTTP (XEP-0124/0206): holds
/// at most `hold + 1` requests in flight, retries transient failures up to
/// `max_retries`, and supports `attach`/`restore` via a [`SessionStore`].
pub struct BoshTransport {
    client: Client,
    url: String,
    content_type: String,
    sid: Option<String>,
    rid: u64,
    next_request_id: u64,
    hold: u32,
    wait: u32,
    max_retries: u32,
    outstanding: Arc<AtomicUsize>,
    pending: Vec<Element>,
    pending_restart: bool,
    paused: Option<u32>,
    session_store: Option<Arc<dyn SessionStore>>,
    keepalive: bool,
    session_jid: Option<String>,
    custom_headers: HashMap<String, String>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl BoshTransport {
    pub fn new(url: impl Into<String>) -> BoshTransport {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        BoshTransport {
            client: Client::new(),
            url: url.into(),
            content_type: "text/xml; charset=utf-8".to_string(),
            sid: None,
            rid: initial_rid(),
            next_request_id: 0,
            hold: 1,
            wait: 60,
            max_retries: 5,
            outstanding: Arc::new(AtomicUsize::new(0)),
            pending: Vec::new(),
            pending_restart: false,
            paused: None,
            session_store: None,
            keepalive: false,
            session_jid: None,
            custom_headers: HashMap::new(),
            events_tx,
            events_rx,
        }
    }

    pub fn with_hold_wait(mut self, hold: u32, wait: u32) -> BoshTransport {
        self.hold = hold;
        self.wait = wait;
        self
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>, keepalive: bool) -> BoshTransport {
        self.session_store = Some(store);
        self.keepalive = keepalive;
        self
    }

    /// Resumes an externally-created session, skipping the initial
    /// session-creation request.
    pub fn attach(&mut self, sid: impl Into<String>, rid: u64) {
        self.sid = Some(sid.into());
        self.rid = rid;
    }

    /// Reloads `{jid, sid, rid}` from the session store, if any was saved.
    /// Returns the saved JID so the caller can skip straight to
    /// authenticated state instead of re-running SASL.
    pub fn restore(&mut self) -> Option<String> {
        let store = self.session_store.as_ref()?;
        let saved: SavedSession = store.load()?;
        self.sid = Some(saved.sid);
        self.rid = saved.rid;
        Some(saved.jid)
    }

    fn body_wrapper(&self, restart: bool) -> ElementBuilder {
        let rid = self.rid.to_string();
        let mut attrs = vec![
            ("rid".to_string(), Some(rid)),
            ("xmlns".to_string(), Some(ns::HTTPBIND.to_string())),
            ("xmlns:xmpp".to_string(), Some(ns::XBOSH.to_string())),
        ];
        if let Some(sid) = &self.sid {
            attrs.push(("sid".to_string(), Some(sid.clone())));
        }
        if restart {
            attrs.push(("xmpp:restart".to_string(), Some("true".to_string())));
        }
        if let Some(pause) = self.paused {
            attrs.push(("pause".to_string(), Some(pause.to_string())));
        }
        ElementBuilder::new("body", attrs)
    }

    fn save_session(&self) {
        if !self.keepalive {
            return;
        }
        if let (Some(store), Some(sid)) = (&self.session_store, &self.sid) {
            store.save(SavedSession {
                jid: self.session_jid.clone().unwrap_or_default(),
                sid: sid.clone(),
                rid: self.rid,
            });
        }
    }

    /// Sends one HTTP request carrying `body`, retrying transient failures
    /// up to `max_retries` times, and forwards the parsed response (or a
    /// recoverable error) over the event channel.
    fn spawn_request(&mut self, body: Element) {
        let id = self.next_request_id;
        self.next_request_id += 1;
        let rid = self.rid;
        self.rid += 1;

        let request = BoshRequest { id, rid, sends: 0 };
        log::trace!(
            "BOSH request #{} (rid {}, attempt {})",
            request.id,
            request.rid,
            request.sends
        );

        let client = self.client.clone();
        let url = self.url.clone();
        let content_type = self.content_type.clone();
        let custom_headers = self.custom_headers.clone();
        let max_retries = self.max_retries;
        let outstanding = self.outstanding.clone();
        let tx = self.events_tx.clone();
        let text = body.to_string();

        outstanding.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            let mut attempt = 0;
            let result = loop {
                let mut req = client
                    .post(&url)
                    .header("Content-Type", content_type.clone());
                for (name, value) in &custom_headers {
                    req = req.header(name, value);
                }
                let resp = req.body(text.clone()).send().await;
                match resp {
                    Ok(resp) if resp.status().is_success() => break resp.text().await.map_err(Error::from),
                    Ok(resp) => {
                        let status = resp.status().as_u16();
                        if attempt >= max_retries {
                            let _ = tx.send(TransportEvent::RecoverableError {
                                status_code: Some(status),
                                message: format!("BOSH request failed with HTTP {}", status),
                            });
                            outstanding.fetch_sub(1, Ordering::SeqCst);
                            return;
                        }
                        attempt += 1;
                        continue;
                    }
                    Err(e) => {
                        if attempt >= max_retries {
                            break Err(Error::from(e));
                        }
                        attempt += 1;
                        continue;
                    }
                }
            };

            outstanding.fetch_sub(1, Ordering::SeqCst);
            match result {
                Ok(text) => match minidom::parse_element(&text) {
                    Ok(element) => {
                        let _ = tx.send(TransportEvent::Stanza(Incoming {
                            element,
                            raw: Some(text),
                        }));
                    }
                    Err(e) => {
                        let _ = tx.send(TransportEvent::RecoverableError {
                            status_code: None,
                            message: format!("bad-format BOSH body: {}", e),
                        });
                    }
                },
                Err(e) => {
                    let _ = tx.send(TransportEvent::RecoverableError {
                        status_code: None,
                        message: e.to_string(),
                    });
                }
            }
        });
    }
}

fn initial_rid() -> u64 {
    // XEP-0124 recommends a large, unpredictable initial rid.
    let mut buf = [0u8; 4];
    getrandom::getrandom(&mut buf).expect("system RNG must be available");
    u32::from_le_bytes(buf) as u64 & 0x7fff_ffff
}

#[async_trait]
impl Transport for BoshTransport {
    fn protocol(&self) -> Protocol {
        Protocol::Bosh
    }

    async fn connect(&mut self, domain: &str, route: Option<&str>) -> Result<ConnectOutcome, Error> {
        if self.sid.is_some() {
            // attach()/restore() already populated sid/rid; skip
            // session-creation and go straight to a normal poll.
            self.spawn_request(self.body_wrapper(false).tree());
            return Ok(self.next_outcome().await);
        }

        let body = self
            .body_wrapper(false)
            .attrs(
                [
                    ("to", Some(domain)),
                    ("route", route),
                    ("wait", Some(&self.wait.to_string())),
                    ("hold", Some(&self.hold.to_string())),
                    ("ver", Some("1.6")),
                    ("xml:lang", Some("en")),
                ]
                .as_slice(),
            )
            .tree();
        self.spawn_request(body);

        match self.next_outcome().await {
            ConnectOutcome::Continue(incoming) => {
                if let Some(sid) = incoming.element.attr("sid") {
                    self.sid = Some(sid.to_string());
                }
                self.save_session();
                Ok(ConnectOutcome::Continue(incoming))
            }
            other => Ok(other),
        }
    }

    fn send(&mut self, stanza: Element) {
        self.pending.push(stanza);
    }

    fn send_restart(&mut self) {
        self.pending_restart = true;
    }

    async fn disconnect(&mut self) {
        let body = self
            .body_wrapper(false)
            .attrs([("type", "terminate")].as_slice())
            .tree();
        self.spawn_request(body);
    }

    fn empty_queue(&self) -> bool {
        self.pending.is_empty()
            && !self.pending_restart
            && self.outstanding.load(Ordering::SeqCst) == 0
    }

    async fn on_idle(&mut self) {
        let outstanding = self.outstanding.load(Ordering::SeqCst);
        if outstanding as u32 > self.hold {
            return;
        }
        if self.pending.is_empty() && !self.pending_restart && outstanding >= 1 {
            // Already holding a long-poll request open; nothing new to send.
            return;
        }
        let restart = std::mem::take(&mut self.pending_restart);
        let mut builder = self.body_wrapper(restart);
        for stanza in self.pending.drain(..) {
            builder = builder.cnode(stanza).up();
        }
        self.spawn_request(builder.tree());
    }

    fn on_disconnect_timeout(&mut self) {
        self.pending.clear();
        self.pending_restart = false;
    }

    async fn recv(&mut self) -> TransportEvent {
        match self.events_rx.recv().await {
            Some(event) => event,
            None => TransportEvent::ClosedUnexpectedly,
        }
    }

    fn no_auth_received(&mut self) {
        log::warn!("BOSH transport: no stream:features received after session creation");
    }

    fn pause(&mut self, seconds: u32) {
        self.paused = Some(seconds);
    }

    fn resume(&mut self) {
        self.paused = None;
    }

    fn attach_session(&mut self, sid: &str, rid: u64) {
        BoshTransport::attach(self, sid, rid);
    }

    fn restore_session(&mut self) -> Option<String> {
        BoshTransport::restore(self)
    }

    fn configure_bosh(&mut self, wait: u32, hold: u32) {
        self.wait = wait;
        self.hold = hold;
    }

    fn configure_http(&mut self, content_type: String, custom_headers: HashMap<String, String>) {
        self.content_type = content_type;
        self.custom_headers = custom_headers;
    }

    fn note_session_jid(&mut self, jid: &str) {
        self.session_jid = Some(jid.to_string());
        self.save_session();
    }

    fn set_session_store(&mut self, store: Arc<dyn SessionStore>, keepalive: bool) {
        self.session_store = Some(store);
        self.keepalive = keepalive;
    }
}

impl BoshTransport {
    async fn next_outcome(&mut self) -> ConnectOutcome {
        match self.recv().await {
            TransportEvent::Stanza(incoming) => {
                if incoming.element.attr("type") == Some("terminate") {
                    ConnectOutcome::Terminated(
                        incoming.element.attr("condition").map(str::to_string),
                    )
                } else {
                    ConnectOutcome::Continue(incoming)
                }
            }
            TransportEvent::ClosedUnexpectedly => ConnectOutcome::Terminated(None),
            TransportEvent::RecoverableError { .. } => ConnectOutcome::BadFormat,
        }
    }
}
