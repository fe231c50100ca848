//! Provides the [`Jid`], [`BareJid`] and [`FullJid`] structs for Jabber IDs.
//!
//! A JID (Jabber ID) has the form `node@domain/resource`, where both `node`
//! and `resource` are optional. A JID without a resource is called a "bare"
//! JID; one with a resource is a "full" JID.

use std::fmt;
use std::str::FromStr;

use memchr::memchr;

/// Errors returned when parsing a JID fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The domain part was empty.
    EmptyDomain,
    /// The node part (before `@`) was present but empty.
    EmptyNode,
    /// The resource part (after `/`) was present but empty.
    EmptyResource,
    /// A bare JID (no `/resource`) was required but a resource was present.
    ResourceNotAllowed,
    /// A full JID (`/resource` required) was missing its resource.
    ResourceRequired,
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::EmptyDomain => write!(fmt, "domain is empty"),
            Error::EmptyNode => write!(fmt, "node is empty"),
            Error::EmptyResource => write!(fmt, "resource is empty"),
            Error::ResourceNotAllowed => write!(fmt, "a bare JID cannot have a resource"),
            Error::ResourceRequired => write!(fmt, "a full JID must have a resource"),
        }
    }
}

impl std::error::Error for Error {}

/// Splits `s` into `(node, domain, resource)` components, none of which
/// include the separating `@` or `/`.
fn split(s: &str) -> Result<(Option<&str>, &str, Option<&str>), Error> {
    let (rest, resource) = match memchr(b'/', s.as_bytes()) {
        Some(idx) => {
            let resource = &s[idx + 1..];
            if resource.is_empty() {
                return Err(Error::EmptyResource);
            }
            (&s[..idx], Some(resource))
        }
        None => (s, None),
    };
    let (node, domain) = match memchr(b'@', rest.as_bytes()) {
        Some(idx) => {
            let node = &rest[..idx];
            if node.is_empty() {
                return Err(Error::EmptyNode);
            }
            (Some(node), &rest[idx + 1..])
        }
        None => (None, rest),
    };
    if domain.is_empty() {
        return Err(Error::EmptyDomain);
    }
    Ok((node, domain, resource))
}

/// A bare Jabber ID, of the form `node@domain` or just `domain`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BareJid {
    node: Option<String>,
    domain: String,
}

/// A full Jabber ID, of the form `node@domain/resource` or `domain/resource`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FullJid {
    node: Option<String>,
    domain: String,
    resource: String,
}

/// Either a bare or a full Jabber ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Jid {
    /// `node@domain` (or `domain`), with no resource.
    Bare(BareJid),
    /// `node@domain/resource` (or `domain/resource`).
    Full(FullJid),
}

impl BareJid {
    /// Builds a bare JID from a node (optional) and a domain.
    pub fn from_parts(node: Option<&str>, domain: &str) -> Result<BareJid, Error> {
        if domain.is_empty() {
            return Err(Error::EmptyDomain);
        }
        if node == Some("") {
            return Err(Error::EmptyNode);
        }
        Ok(BareJid {
            node: node.map(str::to_owned),
            domain: domain.to_owned(),
        })
    }

    /// Parses a bare JID from a string; errors if a `/resource` is present.
    pub fn new(s: &str) -> Result<BareJid, Error> {
        let (node, domain, resource) = split(s)?;
        if resource.is_some() {
            return Err(Error::ResourceNotAllowed);
        }
        BareJid::from_parts(node, domain)
    }

    /// The node (localpart), if any.
    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    /// The domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Builds a full JID by attaching `resource`.
    pub fn with_resource(&self, resource: &str) -> Result<FullJid, Error> {
        FullJid::from_parts(self.node.as_deref(), &self.domain, resource)
    }
}

impl FullJid {
    /// Builds a full JID from its parts.
    pub fn from_parts(node: Option<&str>, domain: &str, resource: &str) -> Result<FullJid, Error> {
        if domain.is_empty() {
            return Err(Error::EmptyDomain);
        }
        if node == Some("") {
            return Err(Error::EmptyNode);
        }
        if resource.is_empty() {
            return Err(Error::EmptyResource);
        }
        Ok(FullJid {
            node: node.map(str::to_owned),
            domain: domain.to_owned(),
            resource: resource.to_owned(),
        })
    }

    /// Parses a full JID from a string; errors if there is no `/resource`.
    pub fn new(s: &str) -> Result<FullJid, Error> {
        let (node, domain, resource) = split(s)?;
        match resource {
            Some(resource) => FullJid::from_parts(node, domain, resource),
            None => Err(Error::ResourceRequired),
        }
    }

    /// The node (localpart), if any.
    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    /// The domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The resource.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Drops the resource, returning the bare JID.
    pub fn to_bare(&self) -> BareJid {
        BareJid {
            node: self.node.clone(),
            domain: self.domain.clone(),
        }
    }
}

impl Jid {
    /// The node (localpart), if any.
    pub fn node(&self) -> Option<&str> {
        match self {
            Jid::Bare(j) => j.node(),
            Jid::Full(j) => j.node(),
        }
    }

    /// The domain.
    pub fn domain(&self) -> &str {
        match self {
            Jid::Bare(j) => j.domain(),
            Jid::Full(j) => j.domain(),
        }
    }

    /// The resource, if this is a full JID.
    pub fn resource(&self) -> Option<&str> {
        match self {
            Jid::Bare(_) => None,
            Jid::Full(j) => Some(j.resource()),
        }
    }

    /// Drops any resource, returning the bare form.
    pub fn to_bare(&self) -> BareJid {
        match self {
            Jid::Bare(j) => j.clone(),
            Jid::Full(j) => j.to_bare(),
        }
    }
}

impl FromStr for BareJid {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BareJid::new(s)
    }
}

impl FromStr for FullJid {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FullJid::new(s)
    }
}

impl FromStr for Jid {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (node, domain, resource) = split(s)?;
        Ok(match resource {
            Some(resource) => Jid::Full(FullJid::from_parts(node, domain, resource)?),
            None => Jid::Bare(BareJid::from_parts(node, domain)?),
        })
    }
}

impl fmt::Display for BareJid {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match &self.node {
            Some(node) => write!(fmt, "{}@{}", node, self.domain),
            None => write!(fmt, "{}", self.domain),
        }
    }
}

impl fmt::Display for FullJid {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match &self.node {
            Some(node) => write!(fmt, "{}@{}/{}", node, self.domain, self.resource),
            None => write!(fmt, "{}/{}", self.domain, self.resource),
        }
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Jid::Bare(j) => j.fmt(fmt),
            Jid::Full(j) => j.fmt(fmt),
        }
    }
}

impl From<BareJid> for Jid {
    fn from(j: BareJid) -> Jid {
        Jid::Bare(j)
    }
}

impl From<FullJid> for Jid {
    fn from(j: FullJid) -> Jid {
        Jid::Full(j)
    }
}

impl TryFrom<Jid> for FullJid {
    type Error = Jid;
    fn try_from(j: Jid) -> Result<FullJid, Jid> {
        match j {
            Jid::Full(j) => Ok(j),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare() {
        let jid: Jid = "user@example.org".parse().unwrap();
        assert_eq!(jid.node(), Some("user"));
        assert_eq!(jid.domain(), "example.org");
        assert_eq!(jid.resource(), None);
    }

    #[test]
    fn parses_full() {
        let jid: Jid = "user@example.org/resource".parse().unwrap();
        assert_eq!(jid.node(), Some("user"));
        assert_eq!(jid.domain(), "example.org");
        assert_eq!(jid.resource(), Some("resource"));
    }

    #[test]
    fn parses_domain_only() {
        let jid: Jid = "example.org".parse().unwrap();
        assert_eq!(jid.node(), None);
        assert_eq!(jid.domain(), "example.org");
    }

    #[test]
    fn rejects_empty_domain() {
        assert_eq!("user@".parse::<Jid>(), Err(Error::EmptyDomain));
    }

    #[test]
    fn rejects_empty_node() {
        assert_eq!("@example.org".parse::<Jid>(), Err(Error::EmptyNode));
    }

    #[test]
    fn rejects_empty_resource() {
        assert_eq!("user@example.org/".parse::<Jid>(), Err(Error::EmptyResource));
    }

    #[test]
    fn bare_rejects_resource() {
        assert_eq!(
            BareJid::new("user@example.org/resource"),
            Err(Error::ResourceNotAllowed)
        );
    }

    #[test]
    fn full_requires_resource() {
        assert_eq!(FullJid::new("user@example.org"), Err(Error::ResourceRequired));
    }

    #[test]
    fn to_bare_drops_resource() {
        let full = FullJid::new("user@example.org/resource").unwrap();
        assert_eq!(full.to_bare(), BareJid::new("user@example.org").unwrap());
    }

    #[test]
    fn roundtrips_display() {
        let s = "user@example.org/resource";
        let jid: Jid = s.parse().unwrap();
        assert_eq!(jid.to_string(), s);
    }

    #[test]
    fn with_resource_builds_full() {
        let bare = BareJid::new("user@example.org").unwrap();
        let full = bare.with_resource("r1").unwrap();
        assert_eq!(full.to_string(), "user@example.org/r1");
    }
}
