//! Connection configuration. Plain structs with `Default` impls; this is a
//! library, so configuration plumbing (env vars, config files) is left to
//! the caller.

use std::collections::HashMap;
use std::time::Duration;

/// A `document.cookie`-style cookie, carried by BOSH requests that need
/// sticky-session routing at a load balancer.
#[derive(Debug, Clone)]
pub struct Cookie {
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<String>,
}

/// Which WebSocket scheme to prefer when the service URL doesn't pin one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WsScheme {
    Ws,
    Wss,
    #[default]
    Auto,
}

/// Options accepted by `Connection::new`.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub protocol: WsScheme,
    pub cookies: HashMap<String, Cookie>,
    /// Restricts the SASL mechanisms tried, by name, in addition to the
    /// `test()` gate. `None` means "whatever the registry offers".
    pub mechanisms: Option<Vec<String>>,
    /// BOSH synchronous mode: hold exactly one request outstanding.
    pub sync: bool,
    pub custom_headers: HashMap<String, String>,
    /// Whether to persist `{jid, sid, rid}` to the session store after
    /// every successful BOSH exchange, for later `restore`.
    pub keepalive: bool,
    pub with_credentials: bool,
    pub content_type: String,
}

impl Default for ConnectionOptions {
    fn default() -> ConnectionOptions {
        ConnectionOptions {
            protocol: WsScheme::default(),
            cookies: HashMap::new(),
            mechanisms: None,
            sync: false,
            custom_headers: HashMap::new(),
            keepalive: false,
            with_credentials: false,
            content_type: "text/xml; charset=utf-8".to_string(),
        }
    }
}

/// Parameters to `connect()`, beyond the JID/password/callback.
#[derive(Debug, Clone)]
pub struct ConnectArgs {
    /// BOSH long-poll hold time, in seconds.
    pub wait: u32,
    /// Maximum simultaneous BOSH requests (beyond the one always held).
    pub hold: u32,
    pub route: Option<String>,
    /// Overrides the authentication identity; defaults to the JID's node.
    pub authcid: Option<String>,
}

impl Default for ConnectArgs {
    fn default() -> ConnectArgs {
        ConnectArgs {
            wait: 60,
            hold: 1,
            route: None,
            authcid: None,
        }
    }
}

/// Tunable timing the engine otherwise hardcodes per the component design:
/// the idle tick and the forced-disconnect timeout.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub idle_tick: Duration,
    pub disconnect_timeout: Duration,
}

impl Default for Timeouts {
    fn default() -> Timeouts {
        Timeouts {
            idle_tick: Duration::from_millis(100),
            disconnect_timeout: Duration::from_millis(3000),
        }
    }
}
