//! Namespace constants the core negotiates or dispatches on.

pub const JABBER_CLIENT: &str = "jabber:client";
pub const JABBER_IQ_AUTH: &str = "jabber:iq:auth";
pub const SASL: &str = "urn:ietf:params:xml:ns:xmpp-sasl";
pub const BIND: &str = "urn:ietf:params:xml:ns:xmpp-bind";
pub const SESSION: &str = "urn:ietf:params:xml:ns:xmpp-session";
pub const FRAMING: &str = "urn:ietf:params:xml:ns:xmpp-framing";
pub const STREAM: &str = "http://etherx.jabber.org/streams";
pub const HTTPBIND: &str = "http://jabber.org/protocol/httpbind";
pub const XBOSH: &str = "urn:xmpp:xbosh";
pub const STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";
pub const IQ_AUTH_FEATURE: &str = "http://jabber.org/features/iq-auth";
