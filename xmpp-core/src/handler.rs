use minidom::Element;

/// Opaque reference to a registered [`Handler`], returned by
/// `Connection::add_handler` and accepted by `Connection::delete_handler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerRef(pub(crate) u64);

/// The set of stanza `type` attribute values a handler accepts. `None`
/// inside the set matches a stanza with no `type` attribute at all.
#[derive(Debug, Clone, Default)]
pub struct TypeMatch(Option<Vec<Option<String>>>);

impl TypeMatch {
    /// Matches any stanza type (the predicate is absent).
    pub fn any() -> TypeMatch {
        TypeMatch(None)
    }

    /// Matches only stanzas whose `type` is one of `types`.
    pub fn one_of<I, S>(types: I) -> TypeMatch
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        TypeMatch(Some(types.into_iter().map(|t| t.map(Into::into)).collect()))
    }

    fn matches(&self, stanza_type: Option<&str>) -> bool {
        match &self.0 {
            None => true,
            Some(set) => set.iter().any(|t| t.as_deref() == stanza_type),
        }
    }
}

/// Options configuring a [`Handler`]'s match predicates, mirroring the
/// optional parameters of `addHandler`.
#[derive(Debug, Clone, Default)]
pub struct HandlerOptions {
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub types: TypeMatch,
    pub id: Option<String>,
    pub from: Option<String>,
    pub match_bare_from_jid: bool,
    pub ignore_namespace_fragment: bool,
    pub starts_with_id: bool,
    pub ends_with_id: bool,
}

fn strip_fragment(ns: &str) -> &str {
    match ns.find('#') {
        Some(idx) => &ns[..idx],
        None => ns,
    }
}

fn bare(jid: &str) -> &str {
    match jid.find('/') {
        Some(idx) => &jid[..idx],
        None => jid,
    }
}

/// A stanza handler: a set of match predicates plus a callback. Persists
/// across invocations unless the callback returns `false`, in which case it
/// is removed from the active list at the next pending-remove drain.
pub struct Handler {
    options: HandlerOptions,
    /// `true` for application-registered handlers, gated on `authenticated`;
    /// `false` for internally-registered (SASL, bind) handlers, which run
    /// before authentication completes.
    pub user: bool,
    callback: Box<dyn FnMut(&Element) -> bool + Send>,
}

impl Handler {
    pub fn new(
        options: HandlerOptions,
        user: bool,
        callback: impl FnMut(&Element) -> bool + Send + 'static,
    ) -> Handler {
        Handler {
            options,
            user,
            callback: Box::new(callback),
        }
    }

    /// True iff every configured predicate accepts `stanza`.
    pub fn is_match(&self, stanza: &Element) -> bool {
        if let Some(ns) = &self.options.namespace {
            let matches_ns = |candidate: Option<&str>| match candidate {
                Some(candidate) if self.options.ignore_namespace_fragment => {
                    strip_fragment(candidate) == strip_fragment(ns)
                }
                Some(candidate) => candidate == ns,
                None => false,
            };
            let stanza_ns_matches = matches_ns(stanza.ns());
            let child_ns_matches = stanza.children().any(|c| matches_ns(c.ns()));
            if !stanza_ns_matches && !child_ns_matches {
                return false;
            }
        }

        if let Some(name) = &self.options.name {
            if stanza.name() != name {
                return false;
            }
        }

        if !self.options.types.matches(stanza.attr("type")) {
            return false;
        }

        if let Some(id) = &self.options.id {
            let stanza_id = stanza.attr("id").unwrap_or("");
            let matches = if self.options.starts_with_id {
                stanza_id.starts_with(id.as_str())
            } else if self.options.ends_with_id {
                stanza_id.ends_with(id.as_str())
            } else {
                stanza_id == id
            };
            if !matches {
                return false;
            }
        }

        if let Some(from) = &self.options.from {
            let stanza_from = stanza.attr("from").unwrap_or("");
            let matches = if self.options.match_bare_from_jid {
                bare(stanza_from) == bare(from)
            } else {
                stanza_from == from
            };
            if !matches {
                return false;
            }
        }

        true
    }

    /// Invokes the callback. Returns whether the handler should be kept.
    pub fn run(&mut self, stanza: &Element) -> bool {
        (self.callback)(stanza)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stanza(xml: &str) -> Element {
        xml.parse().unwrap()
    }

    #[test]
    fn matches_namespace_on_child() {
        let opts = HandlerOptions {
            namespace: Some("urn:ietf:params:xml:ns:xmpp-bind".into()),
            ..Default::default()
        };
        let handler = Handler::new(opts, false, |_| true);
        let iq = stanza(
            "<iq type='set' id='1'><bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/></iq>",
        );
        assert!(handler.is_match(&iq));
    }

    #[test]
    fn ignore_namespace_fragment_strips_hash() {
        let opts = HandlerOptions {
            namespace: Some("urn:xmpp:example".into()),
            ignore_namespace_fragment: true,
            ..Default::default()
        };
        let handler = Handler::new(opts, false, |_| true);
        let el = stanza("<message xmlns='urn:xmpp:example#fragment'/>");
        assert!(handler.is_match(&el));
    }

    #[test]
    fn starts_with_id_matches_prefix() {
        let opts = HandlerOptions {
            id: Some("_auth_".into()),
            starts_with_id: true,
            ..Default::default()
        };
        let handler = Handler::new(opts, false, |_| true);
        let el = stanza("<iq id='_auth_1'/>");
        assert!(handler.is_match(&el));
        let el2 = stanza("<iq id='other'/>");
        assert!(!handler.is_match(&el2));
    }

    #[test]
    fn match_bare_from_jid_ignores_resource() {
        let opts = HandlerOptions {
            from: Some("user@example.org".into()),
            match_bare_from_jid: true,
            ..Default::default()
        };
        let handler = Handler::new(opts, false, |_| true);
        let el = stanza("<message from='user@example.org/mobile'/>");
        assert!(handler.is_match(&el));
    }

    #[test]
    fn type_set_with_none_matches_absent_type() {
        let opts = HandlerOptions {
            types: TypeMatch::one_of([None::<String>, Some("error".to_string())]),
            ..Default::default()
        };
        let handler = Handler::new(opts, false, |_| true);
        let el = stanza("<presence/>");
        assert!(handler.is_match(&el));
    }

    #[test]
    fn run_returns_callback_result() {
        let opts = HandlerOptions::default();
        let mut handler = Handler::new(opts, false, |_| false);
        let el = stanza("<presence/>");
        assert!(!handler.run(&el));
    }
}
