use std::fmt;

/// An error raised by a SASL mechanism while constructing or validating a
/// message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MechanismError {
    /// A required credential (password, authcid, ...) was missing.
    MissingCredential(&'static str),
    /// A challenge could not be parsed (malformed `key=value,...` or bad
    /// Base64).
    MalformedChallenge,
    /// The server's nonce did not extend the client's nonce (possible
    /// downgrade attack).
    NonceMismatch,
    /// The mechanism was asked to produce a response after it considers
    /// the exchange finished.
    ExchangeComplete,
}

impl fmt::Display for MechanismError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MechanismError::MissingCredential(which) => {
                write!(f, "missing credential: {}", which)
            }
            MechanismError::MalformedChallenge => write!(f, "malformed SASL challenge"),
            MechanismError::NonceMismatch => write!(f, "server nonce does not extend client nonce"),
            MechanismError::ExchangeComplete => write!(f, "mechanism exchange already complete"),
        }
    }
}

impl std::error::Error for MechanismError {}
