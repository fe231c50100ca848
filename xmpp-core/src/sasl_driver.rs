//! Mechanism selection and the legacy (non-SASL) authentication fallback.
//! The actual challenge/response round-trip lives in `Connection`, since it
//! needs to send stanzas and register handlers; this module is the part
//! that's pure enough to test without a transport.

use sasl::{registry, SaslContext, SaslMechanism};

/// Picks the highest-priority mechanism (stable sort; ties favor the
/// earlier-registered mechanism) among those the server offered, the caller
/// allows, and whose `test` passes.
pub fn pick_mechanism(
    offered: &[String],
    allowed: Option<&[String]>,
    ctx: &dyn SaslContext,
) -> Option<Box<dyn SaslMechanism>> {
    let mut candidates: Vec<Box<dyn SaslMechanism>> = registry()
        .into_iter()
        .filter(|m| offered.iter().any(|name| name == m.name()))
        .filter(|m| allowed.map_or(true, |allowed| allowed.iter().any(|a| a == m.name())))
        .collect();

    candidates.sort_by(|a, b| b.priority().cmp(&a.priority()));

    candidates.into_iter().find(|m| m.test(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx {
        authzid: String,
        authcid: Option<String>,
        password: Option<String>,
        domain: String,
    }

    impl SaslContext for Ctx {
        fn authzid(&self) -> &str {
            &self.authzid
        }
        fn authcid(&self) -> Option<&str> {
            self.authcid.as_deref()
        }
        fn password(&self) -> Option<&str> {
            self.password.as_deref()
        }
        fn domain(&self) -> &str {
            &self.domain
        }
    }

    #[test]
    fn picks_highest_priority_offered_mechanism() {
        let ctx = Ctx {
            authzid: "user@example.org".to_string(),
            authcid: Some("user".to_string()),
            password: Some("secret".to_string()),
            domain: "example.org".to_string(),
        };
        let offered = vec!["PLAIN".to_string(), "SCRAM-SHA-1".to_string()];
        let picked = pick_mechanism(&offered, None, &ctx).unwrap();
        assert_eq!(picked.name(), "PLAIN");
    }

    #[test]
    fn skips_mechanisms_whose_test_fails() {
        let ctx = Ctx {
            authzid: "example.org".to_string(),
            authcid: None,
            password: None,
            domain: "example.org".to_string(),
        };
        let offered = vec!["PLAIN".to_string(), "ANONYMOUS".to_string()];
        let picked = pick_mechanism(&offered, None, &ctx).unwrap();
        assert_eq!(picked.name(), "ANONYMOUS");
    }

    #[test]
    fn restricts_to_allowed_list() {
        let ctx = Ctx {
            authzid: "user@example.org".to_string(),
            authcid: Some("user".to_string()),
            password: Some("secret".to_string()),
            domain: "example.org".to_string(),
        };
        let offered = vec!["PLAIN".to_string(), "SCRAM-SHA-1".to_string()];
        let allowed = vec!["SCRAM-SHA-1".to_string()];
        let picked = pick_mechanism(&offered, Some(&allowed), &ctx).unwrap();
        assert_eq!(picked.name(), "SCRAM-SHA-1");
    }

    #[test]
    fn none_when_nothing_matches() {
        let ctx = Ctx {
            authzid: "example.org".to_string(),
            authcid: None,
            password: None,
            domain: "example.org".to_string(),
        };
        let offered = vec!["PLAIN".to_string()];
        assert!(pick_mechanism(&offered, None, &ctx).is_none());
    }
}
