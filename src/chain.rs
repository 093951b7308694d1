use crate::attr::Attr;
use std::sync::Arc;

/// One scoped operation recorded on a handler.
#[derive(Debug)]
pub enum Scope {
    /// Attributes merged in at this level.
    Attrs(Vec<Attr>),
    /// Everything added after this point is nested under the group name.
    Group(String),
}

#[derive(Debug)]
struct Node {
    scope: Scope,
    next: Chain,
}

impl Drop for Node {
    // Unlink iteratively; the default drop recurses once per node.
    fn drop(&mut self) {
        let mut next = self.next.0.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.next.0.take(),
                Err(_) => break,
            }
        }
    }
}

/// Immutable, newest-first list of `with_attrs` / `with_group` operations.
///
/// Deriving never touches existing nodes, so handlers cloned from a common
/// ancestor share the prefix without any synchronization.
#[derive(Debug, Clone, Default)]
pub struct Chain(Option<Arc<Node>>);

impl Chain {
    pub fn empty() -> Self {
        Chain(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// New head carrying `attrs`. An empty list leaves the chain as is.
    pub fn with_attrs(&self, attrs: Vec<Attr>) -> Chain {
        if attrs.is_empty() {
            return self.clone();
        }
        self.push(Scope::Attrs(attrs))
    }

    /// New head opening group `name`. An empty name leaves the chain as is.
    pub fn with_group(&self, name: &str) -> Chain {
        if name.is_empty() {
            return self.clone();
        }
        self.push(Scope::Group(name.to_string()))
    }

    fn push(&self, scope: Scope) -> Chain {
        Chain(Some(Arc::new(Node {
            scope,
            next: self.clone(),
        })))
    }

    /// Walk from the most recent scope back to the root.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            next: self.0.as_deref(),
        }
    }

    /// Whether both chains share the same head node.
    pub fn ptr_eq(&self, other: &Chain) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

pub struct Iter<'a> {
    next: Option<&'a Node>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Scope;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.next.0.as_deref();
        Some(&node.scope)
    }
}
