//! Transport-agnostic XMPP connection engine.
//!
//! Negotiates an XMPP session over BOSH or WebSocket, authenticates via SASL
//! (or the legacy `jabber:iq:auth` fallback), binds a resource, and
//! multiplexes stanza traffic to application-registered handlers. The
//! high-level plugin surface (roster, MUC, vCard, ...) is deliberately not
//! part of this crate; it is expected to be built on top of
//! [`Connection`]'s handler/timed-handler/send primitives.

pub mod config;
mod connection;
pub mod error;
pub mod handler;
pub mod ns;
pub mod sasl_driver;
pub mod session_store;
pub mod stanza;
pub mod status;
pub mod timed_handler;
pub mod transport;

pub use config::{ConnectArgs, ConnectionOptions, Cookie, Timeouts, WsScheme};
pub use connection::{Connection, ConnectionHandle, RunEvent, StatusCallback};
pub use error::Error;
pub use handler::{Handler, HandlerOptions, HandlerRef, TypeMatch};
pub use status::ConnectionStatus;
pub use timed_handler::{TimedHandler, TimedHandlerRef};
pub use transport::{bosh::BoshTransport, websocket::WebSocketTransport, Protocol, Transport};
