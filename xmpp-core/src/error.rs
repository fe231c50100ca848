use std::error::Error as StdError;
use std::fmt;

use sasl::MechanismError as SaslMechanismError;

/// Top-level error type.
#[derive(Debug)]
pub enum Error {
    /// I/O error from a transport.
    Io(std::io::Error),
    /// Error parsing a Jabber ID.
    JidParse(jid::Error),
    /// XML parse/structure error.
    Xml(minidom::Error),
    /// Local SASL mechanism implementation error.
    Sasl(SaslMechanismError),
    /// HTTP transport error (BOSH).
    Http(reqwest::Error),
    /// WebSocket transport error.
    WebSocket(tokio_tungstenite::tungstenite::Error),
    /// Protocol-level error, carrying the `condition` string used in status
    /// callbacks.
    Protocol(&'static str),
    /// The connection is not in a state that allows the requested
    /// operation.
    InvalidState,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::JidParse(e) => write!(f, "JID parse error: {}", e),
            Error::Xml(e) => write!(f, "XML error: {}", e),
            Error::Sasl(e) => write!(f, "SASL error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::WebSocket(e) => write!(f, "WebSocket error: {}", e),
            Error::Protocol(condition) => write!(f, "protocol error: {}", condition),
            Error::InvalidState => write!(f, "invalid connection state for this operation"),
        }
    }
}

impl StdError for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<jid::Error> for Error {
    fn from(e: jid::Error) -> Self {
        Error::JidParse(e)
    }
}

impl From<minidom::Error> for Error {
    fn from(e: minidom::Error) -> Self {
        Error::Xml(e)
    }
}

impl From<SaslMechanismError> for Error {
    fn from(e: SaslMechanismError) -> Self {
        Error::Sasl(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(e)
    }
}

/// Well-known `condition` strings carried through status callbacks.
pub mod condition {
    pub const BAD_FORMAT: &str = "bad-format";
    pub const CONFLICT: &str = "conflict";
    pub const BAD_NON_ANON_JID: &str = "x-strophe-bad-non-anon-jid";
    pub const NO_AUTH_MECH: &str = "no-auth-mech";
    pub const UNKNOWN: &str = "unknown";
}
