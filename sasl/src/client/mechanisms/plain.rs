use crate::client::{SaslContext, SaslMechanism};
use crate::error::MechanismError;

/// `PLAIN` (RFC 4616): `authzid \0 authcid \0 password`, sent in the clear
/// (the transport is expected to be encrypted already).
#[derive(Debug, Default)]
pub struct Plain;

impl Plain {
    /// Builds a fresh instance.
    pub fn new() -> Plain {
        Plain
    }
}

impl SaslMechanism for Plain {
    fn name(&self) -> &'static str {
        "PLAIN"
    }

    fn priority(&self) -> i32 {
        70
    }

    fn client_first(&self) -> bool {
        true
    }

    fn test(&self, ctx: &dyn SaslContext) -> bool {
        ctx.authcid().is_some()
    }

    fn on_challenge(
        &mut self,
        ctx: &dyn SaslContext,
        _challenge: Option<&[u8]>,
    ) -> Result<Vec<u8>, MechanismError> {
        let authcid = ctx
            .authcid()
            .ok_or(MechanismError::MissingCredential("authcid"))?;
        let password = ctx
            .password()
            .ok_or(MechanismError::MissingCredential("password"))?;
        let mut payload = Vec::with_capacity(ctx.authzid().len() + authcid.len() + password.len() + 2);
        payload.extend_from_slice(ctx.authzid().as_bytes());
        payload.push(0);
        payload.extend_from_slice(authcid.as_bytes());
        payload.push(0);
        payload.extend_from_slice(password.as_bytes());
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx;
    impl SaslContext for Ctx {
        fn authzid(&self) -> &str {
            "user@example.org"
        }
        fn authcid(&self) -> Option<&str> {
            Some("user")
        }
        fn password(&self) -> Option<&str> {
            Some("secret")
        }
        fn domain(&self) -> &str {
            "example.org"
        }
    }

    #[test]
    fn builds_expected_payload() {
        let mut plain = Plain::new();
        let payload = plain.on_challenge(&Ctx, None).unwrap();
        assert_eq!(payload, b"user@example.org\x00user\x00secret");
    }
}
