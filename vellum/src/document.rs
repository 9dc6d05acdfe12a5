//! The shared document tree components render into.
//!
//! A [`Document`] is a set of named containers. Each container holds an
//! ordered list of subtrees, one per owning component. The API only lets a
//! caller touch the subtree registered under the id it passes, so one
//! component cannot rewrite another's region.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::id::ComponentId;

/// Rendered markup: an element or a text leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Element with tag, attributes and children
    Element {
        /// Tag name
        tag: String,
        /// Attributes in name order
        attrs: BTreeMap<String, String>,
        /// Child nodes
        children: Vec<Node>,
    },
    /// Text content
    Text(String),
}

impl Node {
    /// Create an empty element
    pub fn element(tag: impl Into<String>) -> Self {
        Node::Element {
            tag: tag.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Create a text leaf
    pub fn text(content: impl Into<String>) -> Self {
        Node::Text(content.into())
    }

    /// Set an attribute (no-op on text nodes)
    pub fn attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        if let Node::Element { attrs, .. } = &mut self {
            attrs.insert(key.into(), value.to_string());
        }
        self
    }

    /// Append a child (no-op on text nodes)
    pub fn child(mut self, node: Node) -> Self {
        if let Node::Element { children, .. } = &mut self {
            children.push(node);
        }
        self
    }

    /// Append several children
    pub fn children(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        if let Node::Element { children, .. } = &mut self {
            children.extend(nodes);
        }
        self
    }

    /// Read an attribute
    pub fn get_attr(&self, key: &str) -> Option<&str> {
        match self {
            Node::Element { attrs, .. } => attrs.get(key).map(String::as_str),
            Node::Text(_) => None,
        }
    }

    /// Concatenated text of this node and its descendants
    pub fn text_content(&self) -> String {
        match self {
            Node::Text(text) => text.clone(),
            Node::Element { children, .. } => children.iter().map(Node::text_content).collect(),
        }
    }

    /// Depth-first search for the first element carrying `key=value`
    pub fn find_by_attr(&self, key: &str, value: &str) -> Option<&Node> {
        if self.get_attr(key) == Some(value) {
            return Some(self);
        }
        match self {
            Node::Element { children, .. } => {
                children.iter().find_map(|c| c.find_by_attr(key, value))
            }
            Node::Text(_) => None,
        }
    }

    /// Serialize to HTML-like markup
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(&escape(text)),
            Node::Element { tag, attrs, children } => {
                let _ = write!(out, "<{tag}");
                for (k, v) in attrs {
                    let _ = write!(out, " {k}=\"{}\"", escape(v));
                }
                out.push('>');
                for child in children {
                    child.write_markup(out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[derive(Debug, Clone)]
struct Region {
    owner: ComponentId,
    node: Node,
}

#[derive(Debug, Default)]
struct DocumentInner {
    containers: BTreeMap<String, Vec<Region>>,
}

/// Shared, cloneable handle to the document
#[derive(Debug, Clone, Default)]
pub struct Document {
    inner: Arc<Mutex<DocumentInner>>,
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style container creation
    pub fn with_container(self, id: impl Into<String>) -> Self {
        self.add_container(id);
        self
    }

    /// Add a container; returns false if it already existed
    pub fn add_container(&self, id: impl Into<String>) -> bool {
        let mut inner = self.lock();
        let id = id.into();
        if inner.containers.contains_key(&id) {
            return false;
        }
        inner.containers.insert(id, Vec::new());
        true
    }

    /// Remove a container and everything mounted in it
    pub fn remove_container(&self, id: &str) -> bool {
        self.lock().containers.remove(id).is_some()
    }

    /// Locate a container by id
    pub fn container(&self, id: &str) -> Option<Container> {
        self.lock().containers.contains_key(id).then(|| Container {
            document: self.clone(),
            id: id.to_string(),
        })
    }

    /// Ids of all containers
    pub fn container_ids(&self) -> Vec<String> {
        self.lock().containers.keys().cloned().collect()
    }

    /// Serialize every container as `<section id=..>` blocks
    pub fn to_markup(&self) -> String {
        let inner = self.lock();
        let mut out = String::new();
        for (id, regions) in &inner.containers {
            let _ = write!(out, "<section id=\"{}\">", escape(id));
            for region in regions {
                region.node.write_markup(&mut out);
            }
            out.push_str("</section>");
        }
        out
    }

    fn lock(&self) -> MutexGuard<'_, DocumentInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle to one container of a [`Document`]
#[derive(Debug, Clone)]
pub struct Container {
    document: Document,
    id: String,
}

impl Container {
    /// Container id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Insert or replace the subtree owned by `owner`
    pub fn insert(&self, owner: ComponentId, node: Node) -> Result<()> {
        let mut inner = self.document.lock();
        let regions = inner
            .containers
            .get_mut(&self.id)
            .ok_or_else(|| Error::ContainerNotFound(self.id.clone()))?;
        match regions.iter_mut().find(|r| r.owner == owner) {
            Some(region) => region.node = node,
            None => regions.push(Region { owner, node }),
        }
        Ok(())
    }

    /// Remove the subtree owned by `owner`; returns whether one existed
    pub fn remove(&self, owner: ComponentId) -> bool {
        let mut inner = self.document.lock();
        let Some(regions) = inner.containers.get_mut(&self.id) else {
            return false;
        };
        let before = regions.len();
        regions.retain(|r| r.owner != owner);
        regions.len() != before
    }

    /// The subtree owned by `owner`, if mounted here
    pub fn subtree(&self, owner: ComponentId) -> Option<Node> {
        self.regions()
            .into_iter()
            .find(|(id, _)| *id == owner)
            .map(|(_, node)| node)
    }

    /// Owners with a subtree in this container, in insertion order
    pub fn owners(&self) -> Vec<ComponentId> {
        self.regions().into_iter().map(|(id, _)| id).collect()
    }

    /// Copy of the container contents
    pub fn regions(&self) -> Vec<(ComponentId, Node)> {
        self.document
            .lock()
            .containers
            .get(&self.id)
            .map(|rs| rs.iter().map(|r| (r.owner, r.node.clone())).collect())
            .unwrap_or_default()
    }

    /// Number of mounted subtrees
    pub fn len(&self) -> usize {
        self.document
            .lock()
            .containers
            .get(&self.id)
            .map_or(0, Vec::len)
    }

    /// Check if nothing is mounted
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize the container contents
    pub fn to_markup(&self) -> String {
        self.regions().iter().map(|(_, n)| n.to_markup()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup() {
        let node = Node::element("div")
            .attr("class", "sheet")
            .child(Node::element("h1").child(Node::text("Mira <Ghoul>")));
        assert_eq!(
            node.to_markup(),
            "<div class=\"sheet\"><h1>Mira &lt;Ghoul&gt;</h1></div>"
        );
        assert_eq!(node.text_content(), "Mira <Ghoul>");
    }

    #[test]
    fn test_find_by_attr() {
        let node = Node::element("ul").children([
            Node::element("li").attr("data-trait", "strength").child(Node::text("3")),
            Node::element("li").attr("data-trait", "wits").child(Node::text("2")),
        ]);
        let wits = node.find_by_attr("data-trait", "wits").unwrap();
        assert_eq!(wits.text_content(), "2");
        assert!(node.find_by_attr("data-trait", "charisma").is_none());
    }

    #[test]
    fn test_regions_are_owner_scoped() {
        let document = Document::new().with_container("app");
        let container = document.container("app").unwrap();
        let a = ComponentId::new();
        let b = ComponentId::new();

        container.insert(a, Node::text("a")).unwrap();
        container.insert(b, Node::text("b")).unwrap();
        container.insert(a, Node::text("a2")).unwrap();

        assert_eq!(container.owners(), vec![a, b]);
        assert_eq!(container.subtree(a), Some(Node::text("a2")));
        assert!(container.remove(a));
        assert!(!container.remove(a));
        assert_eq!(container.to_markup(), "b");
    }

    #[test]
    fn test_missing_container() {
        let document = Document::new().with_container("app");
        assert!(document.container("sidebar").is_none());

        let container = document.container("app").unwrap();
        document.remove_container("app");
        let err = container.insert(ComponentId::new(), Node::text("x")).unwrap_err();
        assert!(matches!(err, Error::ContainerNotFound(id) if id == "app"));
    }
}
