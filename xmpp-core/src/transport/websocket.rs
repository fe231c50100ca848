use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use minidom::Element;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::Error;
use crate::ns;

use super::{ConnectOutcome, Incoming, Protocol, Transport, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// RFC 7395 WebSocket framing: one `<open/>`/`<close/>` or stanza per text
/// message, over a single long-lived socket. Stream restarts close and
/// reopen this socket.
pub struct WebSocketTransport {
    url: String,
    sink: Option<futures::stream::SplitSink<WsStream, Message>>,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    reader_handle: Option<tokio::task::JoinHandle<()>>,
    pending: Vec<Element>,
    pending_restart: bool,
    open_domain: String,
    open_route: Option<String>,
}

impl WebSocketTransport {
    /// `url` is the `wss://…` (or `ws://…`) endpoint advertised by the
    /// server (commonly discovered out-of-band via XEP-0156, outside this
    /// crate's scope).
    pub fn new(url: impl Into<String>) -> WebSocketTransport {
        WebSocketTransport {
            url: url.into(),
            sink: None,
            events: None,
            reader_handle: None,
            pending: Vec::new(),
            pending_restart: false,
            open_domain: String::new(),
            open_route: None,
        }
    }

    fn spawn_reader(&mut self, mut stream: futures::stream::SplitStream<WsStream>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(rx);
        self.reader_handle = Some(tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let event = match msg {
                    Ok(Message::Text(text)) => match minidom::parse_element(&text) {
                        Ok(element) => TransportEvent::Stanza(Incoming {
                            element,
                            raw: Some(text.to_string()),
                        }),
                        Err(e) => TransportEvent::RecoverableError {
                            status_code: None,
                            message: e.to_string(),
                        },
                    },
                    Ok(Message::Close(_)) => TransportEvent::ClosedUnexpectedly,
                    Ok(_) => continue,
                    Err(e) => TransportEvent::RecoverableError {
                        status_code: None,
                        message: e.to_string(),
                    },
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
            let _ = tx.send(TransportEvent::ClosedUnexpectedly);
        }));
    }

    async fn open_frame(&mut self, domain: &str, route: Option<&str>) -> Result<(), Error> {
        let open = minidom::ElementBuilder::new(
            "open",
            [
                ("xmlns", Some(ns::FRAMING)),
                ("to", Some(route.unwrap_or(domain))),
                ("version", Some("1.0")),
            ]
            .as_slice(),
        )
        .tree();
        if let Some(sink) = &mut self.sink {
            sink.send(Message::Text(open.to_string().into())).await?;
        }
        Ok(())
    }

    /// Drains queued stanzas (and a pending restart) onto the wire.
    async fn flush(&mut self) {
        if self.pending_restart {
            self.pending_restart = false;
            // A WebSocket stream restart is a fresh `<open/>` over the same
            // socket (RFC 7395), addressed the same way the original
            // `connect()` was.
            let domain = self.open_domain.clone();
            let route = self.open_route.clone();
            let _ = self.open_frame(&domain, route.as_deref()).await;
        }
        if let Some(sink) = &mut self.sink {
            for stanza in self.pending.drain(..) {
                if sink.send(Message::Text(stanza.to_string().into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn protocol(&self) -> Protocol {
        Protocol::WebSocket
    }

    async fn connect(&mut self, domain: &str, route: Option<&str>) -> Result<ConnectOutcome, Error> {
        let (stream, _response) = connect_async(&self.url).await?;
        let (sink, reader) = stream.split();
        self.sink = Some(sink);
        self.spawn_reader(reader);
        self.open_domain = domain.to_string();
        self.open_route = route.map(str::to_string);
        self.open_frame(domain, route).await?;

        match self.recv().await {
            TransportEvent::Stanza(incoming) => {
                if incoming.element.is("close", ns::FRAMING) {
                    Ok(ConnectOutcome::Terminated(
                        incoming.element.attr("see-other-uri").map(str::to_string),
                    ))
                } else {
                    Ok(ConnectOutcome::Continue(incoming))
                }
            }
            TransportEvent::ClosedUnexpectedly => Ok(ConnectOutcome::Terminated(None)),
            TransportEvent::RecoverableError { .. } => Ok(ConnectOutcome::BadFormat),
        }
    }

    fn send(&mut self, stanza: Element) {
        self.pending.push(stanza);
    }

    fn send_restart(&mut self) {
        self.pending_restart = true;
    }

    async fn disconnect(&mut self) {
        if let Some(sink) = &mut self.sink {
            let close = minidom::Element::new_with_ns("close", ns::FRAMING);
            let _ = sink.send(Message::Text(close.to_string().into())).await;
            let _ = sink.close().await;
        }
        if let Some(handle) = self.reader_handle.take() {
            handle.abort();
        }
    }

    fn empty_queue(&self) -> bool {
        self.pending.is_empty() && !self.pending_restart
    }

    async fn on_idle(&mut self) {
        self.flush().await;
    }

    fn on_disconnect_timeout(&mut self) {
        self.pending.clear();
        self.pending_restart = false;
    }

    async fn recv(&mut self) -> TransportEvent {
        self.flush().await;
        match &mut self.events {
            Some(rx) => rx.recv().await.unwrap_or(TransportEvent::ClosedUnexpectedly),
            None => TransportEvent::ClosedUnexpectedly,
        }
    }

    fn no_auth_received(&mut self) {
        log::warn!("websocket transport: no stream:features received after open");
    }
}
