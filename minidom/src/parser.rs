//! Parses a complete XML document (a BOSH `<body/>`, a WebSocket framing
//! element, or a single stanza) into an [`Element`] tree.
//!
//! Both of this crate's transports only ever hand the parser complete,
//! self-contained documents — a BOSH response body, or one WebSocket text
//! frame — so, unlike a raw TCP XMPP stream, there is no need to parse an
//! unterminated `<stream:stream>` opening tag incrementally.

use std::io::Cursor;

use rxml::Event;

use crate::element::Element;
use crate::error::{Error, Result};

/// Parses `input` as a single root element (with its full subtree).
pub fn parse_element(input: &str) -> Result<Element> {
    let mut cursor = Cursor::new(input.as_bytes());
    let mut parser = rxml::Parser::new(&mut cursor);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = match parser.next() {
            Some(event) => event?,
            None => break,
        };
        match event {
            Event::XmlDeclaration(..) => {}
            Event::StartElement(_, (ns, local), attrs) => {
                let mut el = Element::new(local.as_str());
                if let Some(ns) = ns {
                    el.set_attr("xmlns", Some(ns.as_str().to_owned()));
                }
                for (aname, value) in attrs.iter() {
                    el.set_attr(aname.1.as_str(), Some(value.as_str().to_owned()));
                }
                stack.push(el);
            }
            Event::Text(_, text) => {
                if let Some(top) = stack.last_mut() {
                    top.append_text(text.as_str());
                }
            }
            Event::EndElement(_) => {
                let finished = stack.pop().ok_or(Error::EndOfDocument)?;
                match stack.last_mut() {
                    Some(parent) => {
                        parent.append_child(finished);
                    }
                    None => {
                        root = Some(finished);
                    }
                }
            }
        }
        if root.is_some() && stack.is_empty() {
            break;
        }
    }

    root.ok_or(Error::EndOfDocument)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_body() {
        let el = parse_element(
            "<body rid='1' xmlns='http://jabber.org/protocol/httpbind'><iq type='result'/></body>",
        )
        .unwrap();
        assert_eq!(el.name(), "body");
        assert_eq!(el.attr("rid"), Some("1"));
        let iq = el.children().next().unwrap();
        assert_eq!(iq.name(), "iq");
        assert_eq!(iq.attr("type"), Some("result"));
    }

    #[test]
    fn parses_text_content() {
        let el = parse_element("<jid xmlns='urn:ietf:params:xml:ns:xmpp-bind'>user@example.org/r1</jid>").unwrap();
        assert_eq!(el.text(), "user@example.org/r1");
    }
}
