use crate::client::{SaslContext, SaslMechanism};
use crate::error::MechanismError;

/// `ANONYMOUS` (RFC 4505): no credentials at all.
#[derive(Debug, Default)]
pub struct Anonymous;

impl Anonymous {
    /// Builds a fresh instance.
    pub fn new() -> Anonymous {
        Anonymous
    }
}

impl SaslMechanism for Anonymous {
    fn name(&self) -> &'static str {
        "ANONYMOUS"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn client_first(&self) -> bool {
        false
    }

    fn test(&self, ctx: &dyn SaslContext) -> bool {
        ctx.authcid().is_none()
    }

    fn on_challenge(
        &mut self,
        _ctx: &dyn SaslContext,
        _challenge: Option<&[u8]>,
    ) -> Result<Vec<u8>, MechanismError> {
        Ok(Vec::new())
    }
}
