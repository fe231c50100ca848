//! The client-side `SaslMechanism` contract: a uniform
//! `test`/`on_start`/`on_challenge`/`on_success`/`on_failure` surface over
//! seven mechanisms, sorted by priority.

use crate::error::MechanismError;

pub mod mechanisms;

/// Everything a mechanism needs to know about the credentials and identity
/// it is authenticating, without depending on any particular connection
/// type. `xmpp-core`'s `Connection` implements this.
pub trait SaslContext {
    /// The authorization identity (the bare JID being authenticated as).
    fn authzid(&self) -> &str;
    /// The authentication identity (the username/localpart), if any.
    fn authcid(&self) -> Option<&str>;
    /// The password, if any.
    fn password(&self) -> Option<&str>;
    /// The server's domain.
    fn domain(&self) -> &str;
}

/// One SASL mechanism implementation.
///
/// Mechanisms are stateful: `on_challenge` may be called more than once
/// for multi-round mechanisms (DIGEST-MD5, SCRAM-SHA-1), and the mechanism
/// instance tracks where in the exchange it is.
pub trait SaslMechanism: Send {
    /// The mechanism's SASL name, e.g. `"SCRAM-SHA-1"`.
    fn name(&self) -> &'static str;

    /// Selection priority; higher wins when multiple registered mechanisms
    /// are offered by the server. Ties are broken by a stable sort, so
    /// earlier-registered mechanisms of equal priority win.
    fn priority(&self) -> i32;

    /// Whether this mechanism sends an initial response together with
    /// `<auth/>`, rather than waiting for the server's first challenge.
    fn client_first(&self) -> bool;

    /// Whether this mechanism can be attempted given the available
    /// credentials.
    fn test(&self, ctx: &dyn SaslContext) -> bool;

    /// Called once, before the first message is sent.
    fn on_start(&mut self, _ctx: &dyn SaslContext) {}

    /// Produces the payload for the next message.
    ///
    /// `challenge` is `None` when called to build the initial response of a
    /// client-first mechanism, and `Some(bytes)` (the Base64-decoded
    /// challenge) otherwise.
    fn on_challenge(
        &mut self,
        ctx: &dyn SaslContext,
        challenge: Option<&[u8]>,
    ) -> Result<Vec<u8>, MechanismError>;

    /// Called when the server reports `<success/>`. `server_success_data`
    /// is the Base64-decoded content of the `<success/>` element, if any.
    fn on_success(&mut self, _ctx: &dyn SaslContext, _server_success_data: &[u8]) {}

    /// Called when the server reports `<failure/>`.
    fn on_failure(&mut self) {}

    /// The server-signature stashed by a mechanism that verifies mutual
    /// authentication (SCRAM), checked by the driver against the `v=` field
    /// of `<success/>`. `None` for mechanisms with no such check.
    fn server_signature(&self) -> Option<&[u8]> {
        None
    }
}

/// Builds one instance of every mechanism the core knows, unsorted.
///
/// Callers intersect this against the server's offered `<mechanism/>`
/// names and sort candidates by [`SaslMechanism::priority`] descending
/// (stable) before picking the first whose [`SaslMechanism::test`] passes.
pub fn registry() -> Vec<Box<dyn SaslMechanism>> {
    vec![
        Box::new(mechanisms::Anonymous::new()),
        Box::new(mechanisms::External::new()),
        Box::new(mechanisms::OAuthBearer::new()),
        Box::new(mechanisms::XOAuth2::new()),
        Box::new(mechanisms::Plain::new()),
        Box::new(mechanisms::DigestMd5::new()),
        Box::new(mechanisms::ScramSha1::new()),
    ]
}
