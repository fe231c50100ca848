use crate::client::{SaslContext, SaslMechanism};
use crate::error::MechanismError;

/// `X-OAUTH2`, a non-standard precursor to `OAUTHBEARER` still in use by a
/// few deployed servers.
#[derive(Debug, Default)]
pub struct XOAuth2;

impl XOAuth2 {
    /// Builds a fresh instance.
    pub fn new() -> XOAuth2 {
        XOAuth2
    }
}

impl SaslMechanism for XOAuth2 {
    fn name(&self) -> &'static str {
        "X-OAUTH2"
    }

    fn priority(&self) -> i32 {
        30
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
        let mut payload = Vec::with_capacity(ctx.authzid().len() + token.len() + 2);
        payload.push(0);
        payload.extend_from_slice(ctx.authzid().as_bytes());
        payload.push(0);
        payload.extend_from_slice(token.as_bytes());
        Ok(payload)
    }
}
