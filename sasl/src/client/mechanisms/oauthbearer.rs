use crate::client::{SaslContext, SaslMechanism};
use crate::error::MechanismError;

/// `OAUTHBEARER` (RFC 7628).
#[derive(Debug, Default)]
pub struct OAuthBearer;

impl OAuthBearer {
    /// Builds a fresh instance.
    pub fn new() -> OAuthBearer {
        OAuthBearer
    }
}

impl SaslMechanism for OAuthBearer {
    fn name(&self) -> &'static str {
        "OAUTHBEARER"
    }

    fn priority(&self) -> i32 {
        60
    }

    fn client_first(&self) -> bool {
        true
    }

    fn test(&self, ctx: &dyn SaslContext) -> bool {
        ctx.password().is_some()
    }

    fn on_challenge(
        &mut self,
        ctx: &dyn SaslContext,
        _challenge: Option<&[u8]>,
    ) -> Result<Vec<u8>, MechanismError> {
        let token = ctx
            .password()
            .ok_or(MechanismError::MissingCredential("password"))?;
        Ok(format!(
            "n,a={},\x01auth=Bearer {}\x01\x01",
            ctx.authzid(),
            token
        )
        .into_bytes())
    }
}
