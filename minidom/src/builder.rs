use crate::element::{Element, IntoAttrs};
use crate::node::Node;

/// Fluent, cursor-based XML tree construction.
///
/// The cursor starts at the root element produced by [`ElementBuilder::new`].
/// [`c`][Self::c] and [`cnode`][Self::cnode] push a child and move the
/// cursor onto it; [`up`][Self::up] moves the cursor back to the parent;
/// [`t`][Self::t] and [`attrs`][Self::attrs] mutate the node currently under
/// the cursor without moving it. [`tree`][Self::tree] consumes the builder
/// and returns the finished root.
#[derive(Debug, Clone)]
pub struct ElementBuilder {
    root: Element,
    // Path of child indices from `root` down to the element under the
    // cursor. Empty means the cursor is at the root.
    path: Vec<usize>,
}

impl ElementBuilder {
    /// Starts building a new tree rooted at an element named `name` with
    /// the given attributes. The cursor starts at the root.
    pub fn new(name: impl Into<String>, attrs: impl IntoAttrs) -> ElementBuilder {
        let mut root = Element::new(name);
        root.merge_attrs(attrs);
        ElementBuilder { root, path: Vec::new() }
    }

    fn cursor_mut(&mut self) -> &mut Element {
        let mut el = &mut self.root;
        for &idx in &self.path {
            el = el
                .children_mut_raw()
                .nth(idx)
                .and_then(Node::as_element_mut)
                .expect("ElementBuilder cursor path is internally consistent");
        }
        el
    }

    /// Pushes a new child element and moves the cursor onto it.
    pub fn c(mut self, name: impl Into<String>, attrs: impl IntoAttrs) -> ElementBuilder {
        let mut child = Element::new(name);
        child.merge_attrs(attrs);
        let cursor = self.cursor_mut();
        cursor.push_node(Node::Element(child));
        let idx = cursor.node_count() - 1;
        self.path.push(idx);
        self
    }

    /// Attaches a pre-built subtree as a child, moving the cursor onto it.
    pub fn cnode(mut self, tree: Element) -> ElementBuilder {
        let cursor = self.cursor_mut();
        cursor.push_node(Node::Element(tree));
        let idx = cursor.node_count() - 1;
        self.path.push(idx);
        self
    }

    /// Adds a text node at the cursor; the cursor does not move.
    pub fn t(mut self, text: impl Into<String>) -> ElementBuilder {
        let cursor = self.cursor_mut();
        cursor.push_node(Node::Text(text.into()));
        self
    }

    /// Moves the cursor to the parent of the current node. A no-op at the
    /// root.
    pub fn up(mut self) -> ElementBuilder {
        self.path.pop();
        self
    }

    /// Merges attributes into the element at the cursor.
    pub fn attrs(mut self, attrs: impl IntoAttrs) -> ElementBuilder {
        self.cursor_mut().merge_attrs(attrs);
        self
    }

    /// Finishes construction and returns the root element.
    ///
    /// Call this only once building is complete: it consumes the builder,
    /// so no further mutation through the cursor is possible afterwards.
    pub fn tree(self) -> Element {
        self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_tree_with_cursor() {
        let iq = ElementBuilder::new("iq", [("type", "set"), ("id", "1")].as_slice())
            .c("bind", [("xmlns", "urn:ietf:params:xml:ns:xmpp-bind")].as_slice())
            .c("resource", ())
            .t("r1")
            .up()
            .up()
            .tree();
        assert_eq!(iq.name(), "iq");
        let bind = iq.get_child("bind", "urn:ietf:params:xml:ns:xmpp-bind").unwrap();
        let resource = bind.get_child("resource", "").unwrap_or_else(|| bind.children().next().unwrap());
        assert_eq!(resource.text(), "r1");
    }

    #[test]
    fn sibling_after_up() {
        let tree = ElementBuilder::new("body", ())
            .c("a", ())
            .up()
            .c("b", ())
            .tree();
        let names: Vec<&str> = tree.children().map(Element::name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
