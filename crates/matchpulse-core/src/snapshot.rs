//! Structured-node view over a rendered page.
//!
//! Extraction only ever talks to these traits, so any rendering backend
//! (a parsed HTML tree, a live browser DOM, a test fixture) can feed it.

/// One element of a rendered page.
pub trait Node: Sized {
    /// First descendant matching `selector`.
    fn find(&self, selector: &str) -> Option<Self>;

    /// Nearest ancestor (or self) matching `selector`.
    fn closest(&self, selector: &str) -> Option<Self>;

    /// Raw attribute value, if present.
    fn attr(&self, name: &str) -> Option<String>;

    /// Concatenated text content.
    fn text(&self) -> String;

    /// Class names, in document order.
    fn classes(&self) -> Vec<String>;

    /// Outer markup of the element.
    fn outer_html(&self) -> String;

    fn has_class(&self, class: &str) -> bool {
        self.classes().iter().any(|c| c == class)
    }

    /// First descendant matching any selector, tried in order.
    fn find_any(&self, selectors: &[&str]) -> Option<Self> {
        selectors.iter().find_map(|s| self.find(s))
    }

    /// Nearest ancestor matching any selector, tried in order.
    fn closest_any(&self, selectors: &[&str]) -> Option<Self> {
        selectors.iter().find_map(|s| self.closest(s))
    }

    /// First non-empty attribute among `names`, tried in order.
    fn attr_any(&self, names: &[&str]) -> Option<String> {
        names
            .iter()
            .filter_map(|n| self.attr(n))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    }

    /// Trimmed text, or `None` when blank.
    fn trimmed_text(&self) -> Option<String> {
        let text = self.text();
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// A whole rendered page.
pub trait Snapshot {
    type Node<'a>: Node
    where
        Self: 'a;

    /// All elements matching `selector`, in document order.
    fn select_all(&self, selector: &str) -> Vec<Self::Node<'_>>;

    /// Elements for the first selector in the chain that matches anything.
    fn select_first_non_empty(&self, selectors: &[&str]) -> Vec<Self::Node<'_>> {
        selectors
            .iter()
            .map(|s| self.select_all(s))
            .find(|nodes| !nodes.is_empty())
            .unwrap_or_default()
    }
}
