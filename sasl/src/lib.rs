//! SASL (RFC 4422) mechanism negotiation for XMPP clients.
//!
//! This crate only implements the client side: a [`client::SaslMechanism`]
//! trait with a uniform challenge-response contract, a [`client::registry`]
//! of the seven mechanisms a connection may offer, and the per-mechanism
//! implementations under [`client::mechanisms`].

pub mod client;
pub mod error;

mod util;

pub use client::{registry, SaslContext, SaslMechanism};
pub use error::MechanismError;
