//! Accumulator of relation paths joined so far in a pipeline

use std::collections::BTreeMap;

use crate::expression::PropertyPath;
use crate::schema::RelationType;

use super::map::RelationMap;

/// Relation paths currently joined (object form) in the pipeline being built
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationSet {
    joined: BTreeMap<PropertyPath, RelationType>,
}

impl RelationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every node of `maps`
    pub fn insert_maps(&mut self, maps: &[RelationMap]) {
        for map in maps {
            self.joined.insert(map.path.clone(), map.relation_type);
            self.insert_maps(&map.children);
        }
    }

    pub fn contains(&self, path: &[String]) -> bool {
        self.joined.contains_key(path)
    }

    /// Forgets `path` and everything joined beneath it
    pub fn remove_subtree(&mut self, path: &[String]) {
        self.joined.retain(|joined, _| !joined.starts_with(path));
    }

    /// Removes and returns the topmost joined paths that no requested path
    /// runs through. Their subtrees are forgotten as well.
    ///
    /// A joined path is kept when it is a prefix of some requested path, so
    /// a join the output asked for is never turned back into a reference.
    pub fn take_unrequested(
        &mut self,
        requested: &[PropertyPath],
    ) -> Vec<(PropertyPath, RelationType)> {
        let unrequested: Vec<(PropertyPath, RelationType)> = self
            .joined
            .iter()
            .filter(|(path, _)| !is_requested(path, requested))
            .map(|(path, ty)| (path.clone(), *ty))
            .collect();

        let topmost: Vec<(PropertyPath, RelationType)> = unrequested
            .iter()
            .filter(|(path, _)| {
                !unrequested
                    .iter()
                    .any(|(other, _)| other.len() < path.len() && path.starts_with(other))
            })
            .cloned()
            .collect();

        for (path, _) in &topmost {
            self.remove_subtree(path);
        }
        topmost
    }
}

/// True when some requested output path runs through `path`. Such a join
/// stays in object form; any other join is reset before output.
pub fn is_requested(path: &[String], requested: &[PropertyPath]) -> bool {
    requested.iter().any(|r| r.starts_with(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(path: &str) -> PropertyPath {
        path.split('.').map(str::to_string).collect()
    }

    fn set(paths: &[&str]) -> RelationSet {
        let mut set = RelationSet::new();
        for path in paths {
            set.joined.insert(p(path), RelationType::OneToOne);
        }
        set
    }

    #[test]
    fn test_remove_subtree() {
        let mut used = set(&["author", "author.company", "authority", "tags"]);
        used.remove_subtree(&p("author"));
        assert!(!used.contains(&p("author.company")));
        assert!(used.contains(&p("authority")));
        assert_eq!(used.joined.len(), 2);
    }

    #[test]
    fn test_take_unrequested_topmost_only() {
        let mut used = set(&["author", "author.company", "tags"]);
        let taken = used.take_unrequested(&[p("tags.label")]);

        assert_eq!(taken, vec![(p("author"), RelationType::OneToOne)]);
        assert!(used.contains(&p("tags")));
        assert_eq!(used.joined.len(), 1);
    }

    #[test]
    fn test_take_unrequested_keeps_requested_parent() {
        let mut used = set(&["author", "author.company"]);
        let taken = used.take_unrequested(&[p("author")]);

        assert_eq!(taken, vec![(p("author.company"), RelationType::OneToOne)]);
        assert!(used.contains(&p("author")));
    }
}
