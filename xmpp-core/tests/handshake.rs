//! End-to-end handshake scenarios driven against a scripted [`Transport`]
//! double instead of a real socket, covering the status-callback sequences
//! a real server would produce.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use minidom::Element;
use xmpp_core::transport::{ConnectOutcome, Incoming, Protocol, Transport, TransportEvent};
use xmpp_core::{ConnectArgs, Connection, ConnectionOptions, ConnectionStatus};

/// A transport double that plays server: `recv()` drains a scripted queue,
/// and `send()` inspects what the connection sent to decide what to queue
/// next, so the whole exchange runs without a socket.
struct ScriptedServer {
    queue: VecDeque<TransportEvent>,
    /// When true, the SASL `<success/>` this server sends back carries a
    /// `v=` value that cannot possibly match the client's computed
    /// server-signature (scenario 3).
    corrupt_scram_signature: bool,
}

fn stanza_event(xml: &str) -> TransportEvent {
    TransportEvent::Stanza(Incoming { element: xml.parse().unwrap(), raw: None })
}

impl ScriptedServer {
    fn new(initial: &str) -> ScriptedServer {
        ScriptedServer {
            queue: VecDeque::from([stanza_event(initial)]),
            corrupt_scram_signature: false,
        }
    }
}

#[async_trait]
impl Transport for ScriptedServer {
    fn protocol(&self) -> Protocol {
        Protocol::WebSocket
    }

    async fn connect(&mut self, _domain: &str, _route: Option<&str>) -> Result<ConnectOutcome, xmpp_core::Error> {
        match self.recv().await {
            TransportEvent::Stanza(incoming) => Ok(ConnectOutcome::Continue(incoming)),
            TransportEvent::ClosedUnexpectedly => Ok(ConnectOutcome::Terminated(None)),
            TransportEvent::RecoverableError { .. } => Ok(ConnectOutcome::BadFormat),
        }
    }

    fn send(&mut self, stanza: Element) {
        if stanza.name() == "auth" && stanza.ns() == Some(xmpp_core_ns::SASL) {
            match stanza.attr("mechanism") {
                Some("PLAIN") => {
                    self.queue.push_back(stanza_event(
                        "<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>",
                    ));
                    self.queue.push_back(stanza_event(
                        "<stream:features xmlns:stream='http://etherx.jabber.org/streams'>\
                           <bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/>\
                         </stream:features>",
                    ));
                }
                Some("SCRAM-SHA-1") => {
                    let payload = BASE64.decode(stanza.text().trim()).unwrap();
                    let text = String::from_utf8(payload).unwrap();
                    let cnonce = text.rsplit("r=").next().unwrap();
                    let server_first = format!("r={}servernonce,s=QSXCR+Q6sek8bf92,i=4096", cnonce);
                    let challenge = format!(
                        "<challenge xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>{}</challenge>",
                        BASE64.encode(server_first)
                    );
                    self.queue.push_back(stanza_event(&challenge));
                }
                _ => {}
            }
        } else if stanza.name() == "response" && stanza.ns() == Some(xmpp_core_ns::SASL) {
            let v = if self.corrupt_scram_signature {
                BASE64.encode(b"not-the-real-signature")
            } else {
                BASE64.encode(b"irrelevant-since-this-suite-only-exercises-the-mismatch-path")
            };
            let success = format!(
                "<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>{}</success>",
                BASE64.encode(format!("v={}", v))
            );
            self.queue.push_back(stanza_event(&success));
        } else if stanza.name() == "iq" {
            if let Some(bind) = stanza.get_child("bind", xmpp_core_ns::BIND) {
                let _ = bind;
                let id = stanza.attr("id").unwrap_or_default();
                let reply = format!(
                    "<iq type='result' id='{}'>\
                       <bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'>\
                         <jid>user@example.org/resource1</jid>\
                       </bind>\
                     </iq>",
                    id
                );
                self.queue.push_back(stanza_event(&reply));
            }
        }
    }

    fn send_restart(&mut self) {}

    async fn disconnect(&mut self) {}

    fn empty_queue(&self) -> bool {
        true
    }

    async fn on_idle(&mut self) {}

    fn on_disconnect_timeout(&mut self) {}

    async fn recv(&mut self) -> TransportEvent {
        self.queue.pop_front().unwrap_or(TransportEvent::ClosedUnexpectedly)
    }

    fn no_auth_received(&mut self) {}
}

/// Namespaces duplicated from `xmpp_core::ns`, which is private to the
/// crate under test; a public re-export isn't warranted just for this.
mod xmpp_core_ns {
    pub const SASL: &str = "urn:ietf:params:xml:ns:xmpp-sasl";
    pub const BIND: &str = "urn:ietf:params:xml:ns:xmpp-bind";
}

fn status_recorder() -> (Arc<Mutex<Vec<(ConnectionStatus, Option<String>)>>>, xmpp_core::StatusCallback) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let log_for_cb = log.clone();
    let cb: xmpp_core::StatusCallback = Box::new(move |status, condition, _elem| {
        log_for_cb.lock().unwrap().push((status, condition.map(str::to_string)));
    });
    (log, cb)
}

/// Scenario 1: a full PLAIN handshake reaches `Connected` after
/// `Connecting` and `Authenticating`, in order.
#[tokio::test]
async fn plain_handshake_reaches_connected() {
    let transport = Box::new(ScriptedServer::new(
        "<stream:features xmlns:stream='http://etherx.jabber.org/streams'>\
           <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><mechanism>PLAIN</mechanism></mechanisms>\
         </stream:features>",
    ));
    let mut conn = Connection::with_transport(transport, ConnectionOptions::default());
    let (log, cb) = status_recorder();

    conn.connect("user@example.org", "secret", cb, ConnectArgs::default())
        .await
        .expect("handshake should succeed");

    assert!(conn.is_connected());
    assert!(conn.is_authenticated());
    assert_eq!(conn.jid().unwrap().to_string(), "user@example.org/resource1");

    let statuses: Vec<ConnectionStatus> = log.lock().unwrap().iter().map(|(s, _)| *s).collect();
    assert_eq!(
        statuses,
        vec![
            ConnectionStatus::Connecting,
            ConnectionStatus::Authenticating,
            ConnectionStatus::Connected,
        ]
    );
}

/// Scenario 3: a `<success/>` whose `v=` doesn't match the client's
/// independently-computed server-signature fails authentication rather than
/// being accepted.
#[tokio::test]
async fn scram_server_signature_mismatch_fails_auth() {
    let mut transport = ScriptedServer::new(
        "<stream:features xmlns:stream='http://etherx.jabber.org/streams'>\
           <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><mechanism>SCRAM-SHA-1</mechanism></mechanisms>\
         </stream:features>",
    );
    transport.corrupt_scram_signature = true;
    let mut conn = Connection::with_transport(Box::new(transport), ConnectionOptions::default());
    let (log, cb) = status_recorder();

    let err = conn
        .connect("user@example.org", "secret", cb, ConnectArgs::default())
        .await
        .expect_err("mismatched server signature must fail the handshake");

    assert_eq!(err.to_string(), "protocol error: server-signature-mismatch");
    assert!(!conn.is_authenticated());

    let statuses: Vec<ConnectionStatus> = log.lock().unwrap().iter().map(|(s, _)| *s).collect();
    assert_eq!(statuses, vec![ConnectionStatus::Connecting, ConnectionStatus::Authenticating, ConnectionStatus::AuthFail]);
}

/// Scenario 6: a post-connect response with no `stream:features` at all
/// fails with the `no-auth-mech` condition instead of hanging.
#[tokio::test]
async fn missing_stream_features_fails_with_no_auth_mech() {
    let transport = Box::new(ScriptedServer::new("<message xmlns='jabber:client'/>"));
    let mut conn = Connection::with_transport(transport, ConnectionOptions::default());
    let (log, cb) = status_recorder();

    let err = conn
        .connect("user@example.org", "secret", cb, ConnectArgs::default())
        .await
        .expect_err("no stream:features should fail the handshake");

    assert_eq!(err.to_string(), "protocol error: no-auth-mech");

    let entries = log.lock().unwrap();
    assert_eq!(entries.last().unwrap().0, ConnectionStatus::ConnFail);
    assert_eq!(entries.last().unwrap().1.as_deref(), Some("no-auth-mech"));
}
