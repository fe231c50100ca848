use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha1::{Digest, Sha1};

use crate::client::{SaslContext, SaslMechanism};
use crate::error::MechanismError;
use crate::util::make_cnonce;

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Default)]
enum State {
    #[default]
    NotStarted,
    WaitingServerFirst {
        client_first_message_bare: String,
        cnonce: String,
    },
    WaitingSuccess {
        server_signature: Vec<u8>,
    },
    Done,
}

/// `SCRAM-SHA-1` (RFC 5802): a salted, iterated challenge-response exchange
/// that also lets the client verify the server knows the password, via the
/// stashed server-signature checked against `<success/>`'s `v=` field.
#[derive(Debug, Default)]
pub struct ScramSha1 {
    state: State,
}

impl ScramSha1 {
    /// Builds a fresh instance.
    pub fn new() -> ScramSha1 {
        ScramSha1::default()
    }
}

fn parse_fields(s: &str) -> Vec<(char, &str)> {
    s.split(',')
        .filter_map(|kv| {
            let mut it = kv.splitn(2, '=');
            let key = it.next()?.chars().next()?;
            let value = it.next()?;
            Some((key, value))
        })
        .collect()
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = <HmacSha1 as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect()
}

impl SaslMechanism for ScramSha1 {
    fn name(&self) -> &'static str {
        "SCRAM-SHA-1"
    }

    fn priority(&self) -> i32 {
        50
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
        challenge: Option<&[u8]>,
    ) -> Result<Vec<u8>, MechanismError> {
        match (&self.state, challenge) {
            (State::NotStarted, None) => {
                let authcid = ctx
                    .authcid()
                    .ok_or(MechanismError::MissingCredential("authcid"))?;
                let cnonce = make_cnonce();
                let client_first_message_bare = format!("n={},r={}", authcid, cnonce);
                let message = format!("n,,{}", client_first_message_bare);
                self.state = State::WaitingServerFirst {
                    client_first_message_bare,
                    cnonce,
                };
                Ok(message.into_bytes())
            }
            (State::WaitingServerFirst { client_first_message_bare, cnonce }, Some(server_first)) => {
                let server_first = std::str::from_utf8(server_first)
                    .map_err(|_| MechanismError::MalformedChallenge)?;
                let fields = parse_fields(server_first);
                let nonce = fields
                    .iter()
                    .find(|(k, _)| *k == 'r')
                    .map(|(_, v)| *v)
                    .ok_or(MechanismError::MalformedChallenge)?;
                let salt_b64 = fields
                    .iter()
                    .find(|(k, _)| *k == 's')
                    .map(|(_, v)| *v)
                    .ok_or(MechanismError::MalformedChallenge)?;
                let iterations: u32 = fields
                    .iter()
                    .find(|(k, _)| *k == 'i')
                    .and_then(|(_, v)| v.parse().ok())
                    .ok_or(MechanismError::MalformedChallenge)?;

                if !nonce.starts_with(cnonce.as_str()) {
                    return Err(MechanismError::NonceMismatch);
                }

                let password = ctx
                    .password()
                    .ok_or(MechanismError::MissingCredential("password"))?;
                let salt = BASE64
                    .decode(salt_b64)
                    .map_err(|_| MechanismError::MalformedChallenge)?;

                let mut salted_password = [0u8; 20];
                pbkdf2_hmac::<Sha1>(password.as_bytes(), &salt, iterations, &mut salted_password);

                let client_key = hmac(&salted_password, b"Client Key");
                let server_key = hmac(&salted_password, b"Server Key");
                let stored_key = Sha1::digest(&client_key);

                let channel_binding = "c=biws"; // base64("n,,")
                let client_final_without_proof = format!("{},r={}", channel_binding, nonce);

                let auth_message = format!(
                    "{},{},{}",
                    client_first_message_bare, server_first, client_final_without_proof
                );

                let client_signature = hmac(&stored_key, auth_message.as_bytes());
                let client_proof = xor(&client_key, &client_signature);
                let server_signature = hmac(&server_key, auth_message.as_bytes());

                let response = format!(
                    "{},p={}",
                    client_final_without_proof,
                    BASE64.encode(client_proof)
                );

                self.state = State::WaitingSuccess { server_signature };
                Ok(response.into_bytes())
            }
            _ => Err(MechanismError::ExchangeComplete),
        }
    }

    fn on_success(&mut self, _ctx: &dyn SaslContext, _server_success_data: &[u8]) {
        self.state = State::Done;
    }

    fn on_failure(&mut self) {
        self.state = State::Done;
    }

    fn server_signature(&self) -> Option<&[u8]> {
        match &self.state {
            State::WaitingSuccess { server_signature } => Some(server_signature),
            _ => None,
        }
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
            Some("pencil")
        }
        fn domain(&self) -> &str {
            "example.org"
        }
    }

    #[test]
    fn client_first_has_gs2_header_and_nonce() {
        let mut scram = ScramSha1::new();
        let msg = scram.on_challenge(&Ctx, None).unwrap();
        let msg = String::from_utf8(msg).unwrap();
        assert!(msg.starts_with("n,,n=user,r="));
    }

    #[test]
    fn rejects_nonce_not_extending_client_nonce() {
        let mut scram = ScramSha1::new();
        scram.on_challenge(&Ctx, None).unwrap();
        let bogus_server_first = b"r=totally-different,s=QSXCR+Q6sek8bf92,i=4096";
        let err = scram.on_challenge(&Ctx, Some(bogus_server_first)).unwrap_err();
        assert_eq!(err, MechanismError::NonceMismatch);
    }

    #[test]
    fn stashes_server_signature_after_second_round() {
        let mut scram = ScramSha1::new();
        let first = scram.on_challenge(&Ctx, None).unwrap();
        let first = String::from_utf8(first).unwrap();
        let cnonce = first.trim_start_matches("n,,n=user,r=").to_string();
        let server_first = format!("r={}servernonce,s=QSXCR+Q6sek8bf92,i=4096", cnonce);
        scram.on_challenge(&Ctx, Some(server_first.as_bytes())).unwrap();
        assert!(scram.server_signature().is_some());
    }
}
