//! Post-order traversal over a snapshot of entry names.
//!
//! Directory removal walks a tree built from the names up front and only then
//! mutates the archive, so no directory is enumerated while its children are
//! being removed.

use std::collections::BTreeMap;

use super::path::EntryPath;

#[derive(Default)]
struct Node {
    children: BTreeMap<String, Node>,
}

impl Node {
    fn insert(&mut self, relative: &str) {
        let mut node = self;
        for part in relative.split('/').filter(|p| !p.is_empty()) {
            node = node.children.entry(part.to_string()).or_default();
        }
    }

    fn walk(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, child) in &self.children {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };
            child.walk(&path, out);
            out.push(path);
        }
    }
}

/// Every path at or beneath `root`, children before their parent.
///
/// Intermediate directories implied by deeper names are included even when
/// no explicit entry exists for them. The root itself comes last (unless it
/// is the archive root, which is never an entry).
pub fn post_order<'a, I>(names: I, root: &EntryPath) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tree = Node::default();
    for name in names {
        if root.is_root() {
            tree.insert(name);
        } else if root.is_ancestor_of(name) {
            tree.insert(&name[root.as_str().len() + 1..]);
        }
    }

    let mut out = Vec::new();
    tree.walk(root.as_str(), &mut out);
    if !root.is_root() {
        out.push(root.as_str().to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_children_precede_parents() {
        let names = ["res/values/strings.xml", "res/values", "res/layout/main.xml", "res", "classes.dex"];
        let order = post_order(names, &EntryPath::new("res"));

        assert_eq!(order.last().map(String::as_str), Some("res"));
        assert!(position(&order, "res/values/strings.xml") < position(&order, "res/values"));
        assert!(position(&order, "res/layout/main.xml") < position(&order, "res/layout"));
        assert!(!order.iter().any(|n| n == "classes.dex"));
    }

    #[test]
    fn test_implied_directories_are_included() {
        let order = post_order(["assets/a/b/c.bin"], &EntryPath::new("assets"));
        assert_eq!(order, vec!["assets/a/b/c.bin", "assets/a/b", "assets/a", "assets"]);
    }

    #[test]
    fn test_sibling_with_shared_prefix_is_untouched() {
        let order = post_order(["res/x", "resources.arsc"], &EntryPath::new("res"));
        assert_eq!(order, vec!["res/x", "res"]);
    }

    #[test]
    fn test_archive_root_covers_everything() {
        let order = post_order(["a/b", "c"], &EntryPath::default());
        assert_eq!(order, vec!["a/b", "a", "c"]);
    }
}
