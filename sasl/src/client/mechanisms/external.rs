use crate::client::{SaslContext, SaslMechanism};
use crate::error::MechanismError;

/// `EXTERNAL` (RFC 4422 appendix A): authentication is established by a
/// lower layer (e.g. a TLS client certificate); the payload only carries
/// the authzid when it differs from the implied identity.
#[derive(Debug, Default)]
pub struct External;

impl External {
    /// Builds a fresh instance.
    pub fn new() -> External {
        External
    }
}

impl SaslMechanism for External {
    fn name(&self) -> &'static str {
        "EXTERNAL"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn client_first(&self) -> bool {
        true
    }

    fn test(&self, _ctx: &dyn SaslContext) -> bool {
        true
    }

    fn on_challenge(
        &mut self,
        ctx: &dyn SaslContext,
        _challenge: Option<&[u8]>,
    ) -> Result<Vec<u8>, MechanismError> {
        match ctx.authcid() {
            Some(authcid) if authcid != ctx.authzid() => Ok(ctx.authzid().as_bytes().to_vec()),
            _ => Ok(Vec::new()),
        }
    }
}
