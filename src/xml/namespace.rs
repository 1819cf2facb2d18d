use super::tree::{split_prefix, Element};

/// Ordered prefix → URI table for `xmlns:*` declarations.
///
/// Each merge run builds its own table from the documents it loads; nothing
/// is registered globally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceBindings {
    bindings: Vec<(String, String)>,
}

impl NamespaceBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the `xmlns:<prefix>` attributes declared on `root`.
    pub fn from_root(root: &Element) -> Self {
        let mut table = Self::new();
        for (key, value) in &root.attributes {
            if let Some(prefix) = key.strip_prefix("xmlns:") {
                table.insert(prefix, value);
            }
        }
        table
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Adds a binding unless the prefix is already bound.
    ///
    /// Returns `false` when the prefix was already bound to a different URI;
    /// the existing binding is kept.
    pub fn insert(&mut self, prefix: &str, uri: &str) -> bool {
        match self.get(prefix) {
            Some(existing) => existing == uri,
            None => {
                self.bindings.push((prefix.to_string(), uri.to_string()));
                true
            }
        }
    }

    /// This table with the declarations of `element` layered on top.
    ///
    /// Unlike [`insert`](Self::insert), a declaration on `element` replaces
    /// an outer binding for the same prefix, as XML scoping requires.
    pub fn overlay(&self, element: &Element) -> NamespaceBindings {
        let mut scoped = self.clone();
        for (key, uri) in &element.attributes {
            if let Some(prefix) = key.strip_prefix("xmlns:") {
                match scoped.bindings.iter_mut().find(|(p, _)| p == prefix) {
                    Some(slot) => slot.1 = uri.clone(),
                    None => scoped.bindings.push((prefix.to_string(), uri.clone())),
                }
            }
        }
        scoped
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Prefixes used inside `element` that neither it nor any of its
/// descendants declare where they are used.
///
/// `inherited` lists prefixes already declared by ancestors.
pub fn undeclared_prefixes(element: &Element, inherited: &[String]) -> Vec<String> {
    let mut missing = Vec::new();
    collect_undeclared(element, inherited.to_vec(), &mut missing);
    missing
}

fn collect_undeclared(element: &Element, mut in_scope: Vec<String>, missing: &mut Vec<String>) {
    for (key, _) in &element.attributes {
        if let Some(prefix) = key.strip_prefix("xmlns:") {
            in_scope.push(prefix.to_string());
        }
    }

    let mut check = |prefix: &str| {
        if prefix != "xml"
            && prefix != "xmlns"
            && !in_scope.iter().any(|p| p == prefix)
            && !missing.iter().any(|p| p == prefix)
        {
            missing.push(prefix.to_string());
        }
    };
    if let Some(prefix) = element.prefix() {
        check(prefix);
    }
    for (key, _) in &element.attributes {
        if let (Some(prefix), _) = split_prefix(key) {
            check(prefix);
        }
    }

    for child in element.elements() {
        collect_undeclared(child, in_scope.clone(), missing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{Document, Node};

    const ITUNES: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";

    #[test]
    fn test_from_root_collects_xmlns_attributes() {
        let doc = Document::parse(&format!(
            r#"<rss version="2.0" xmlns:itunes="{ITUNES}" xmlns:atom="http://www.w3.org/2005/Atom"/>"#
        ))
        .unwrap();
        let table = NamespaceBindings::from_root(&doc.root);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("itunes"), Some(ITUNES));
        assert_eq!(table.get("atom"), Some("http://www.w3.org/2005/Atom"));
        assert_eq!(table.get("version"), None);
    }

    #[test]
    fn test_insert_keeps_existing_binding() {
        let mut table = NamespaceBindings::new();
        assert!(table.insert("media", "http://search.yahoo.com/mrss/"));
        assert!(table.insert("media", "http://search.yahoo.com/mrss/"));
        assert!(!table.insert("media", "urn:other"));
        assert_eq!(table.get("media"), Some("http://search.yahoo.com/mrss/"));
    }

    #[test]
    fn test_overlay_replaces_outer_binding() {
        let mut outer = NamespaceBindings::new();
        outer.insert("media", "http://search.yahoo.com/mrss/");
        outer.insert("itunes", ITUNES);

        let mut item = Element::new("item");
        item.set_attribute("xmlns:media", "urn:other");
        item.set_attribute("xmlns:dc", "http://purl.org/dc/elements/1.1/");

        let scoped = outer.overlay(&item);
        assert_eq!(scoped.get("media"), Some("urn:other"));
        assert_eq!(scoped.get("itunes"), Some(ITUNES));
        assert_eq!(scoped.get("dc"), Some("http://purl.org/dc/elements/1.1/"));
        assert_eq!(outer.get("media"), Some("http://search.yahoo.com/mrss/"));
    }

    #[test]
    fn test_undeclared_respects_local_declarations() {
        let mut item = Element::new("item");
        item.set_attribute("xmlns:media", "http://search.yahoo.com/mrss/");
        item.children
            .push(Node::Element(Element::new("media:thumbnail")));
        item.children
            .push(Node::Element(Element::new("itunes:duration")));
        assert_eq!(undeclared_prefixes(&item, &[]), vec!["itunes"]);
        assert!(undeclared_prefixes(&item, &["itunes".to_string()]).is_empty());
    }
}
