//! Stanza construction helpers and the XML utilities component: JID node
//! escaping (XEP-0106). Unique id generation lives on `Connection` itself,
//! since it is a per-connection monotonic counter, not a free function.

use minidom::ElementBuilder;

/// Starts building an `<iq/>` stanza with the given `type` and `id`.
pub fn iq(kind: &str, id: &str) -> ElementBuilder {
    ElementBuilder::new("iq", [("type", kind), ("id", id)].as_slice())
}

/// Starts building a `<presence/>` stanza, optionally typed.
pub fn presence(kind: Option<&str>) -> ElementBuilder {
    ElementBuilder::new("presence", [("type", kind)].as_slice())
}

/// Starts building a `<message/>` stanza addressed `to`, optionally typed.
pub fn message(to: &str, kind: Option<&str>) -> ElementBuilder {
    ElementBuilder::new("message", [("to", Some(to)), ("type", kind)].as_slice())
}

const ESCAPE_TABLE: &[(char, &str)] = &[
    (' ', "\\20"),
    ('"', "\\22"),
    ('&', "\\26"),
    ('\'', "\\27"),
    ('/', "\\2f"),
    (':', "\\3a"),
    ('<', "\\3c"),
    ('>', "\\3e"),
    ('@', "\\40"),
    ('\\', "\\5c"),
];

/// Escapes a JID node (localpart) per XEP-0106, so that characters disallowed
/// in the node production can appear in a display name used as a node.
pub fn escape_node(node: &str) -> String {
    let mut out = String::with_capacity(node.len());
    for c in node.chars() {
        match ESCAPE_TABLE.iter().find(|(ch, _)| *ch == c) {
            Some((_, escaped)) => out.push_str(escaped),
            None => out.push(c),
        }
    }
    out
}

/// Reverses [`escape_node`].
pub fn unescape_node(node: &str) -> String {
    let mut out = String::with_capacity(node.len());
    let bytes = node.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 2 < bytes.len() {
            let seq = &node[i..i + 3];
            if let Some((c, _)) = ESCAPE_TABLE.iter().find(|(_, esc)| *esc == seq) {
                out.push(*c);
                i += 3;
                continue;
            }
        }
        let ch = node[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iq_builder_sets_type_and_id() {
        let el = iq("set", "_bind_auth_2").tree();
        assert_eq!(el.attr("type"), Some("set"));
        assert_eq!(el.attr("id"), Some("_bind_auth_2"));
    }

    #[test]
    fn presence_omits_type_when_none() {
        let el = presence(None).tree();
        assert_eq!(el.attr("type"), None);
    }

    #[test]
    fn escape_node_round_trips() {
        let node = "node with a space & an @ sign";
        let escaped = escape_node(node);
        assert!(!escaped.contains(' '));
        assert_eq!(unescape_node(&escaped), node);
    }
}
