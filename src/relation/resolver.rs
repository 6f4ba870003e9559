//! Relation map resolution
//!
//! Paths are grouped by the first relation property they cross. Target
//! schemas of sibling groups are fetched concurrently; the remainder of each
//! path is then resolved against the target's properties.

use futures_util::future::{try_join_all, BoxFuture};
use tracing::{debug, warn};

use crate::expression::PropertyPath;
use crate::schema::{Properties, PropertySpec, RelationType, SchemaProvider, SchemaResult};

use super::map::{JoinScope, RelationMap};

struct Group {
    prefix: PropertyPath,
    bucket_id: String,
    relation_type: RelationType,
    suffixes: Vec<PropertyPath>,
}

/// Builds relation maps for `paths` (relative to the document root).
///
/// Provider failures propagate. Each branch stops after `max_depth` hops.
pub async fn resolve(
    paths: &[PropertyPath],
    properties: &Properties,
    provider: &dyn SchemaProvider,
    scope: JoinScope,
    max_depth: usize,
) -> SchemaResult<Vec<RelationMap>> {
    if paths.is_empty() {
        return Ok(Vec::new());
    }
    resolve_level(paths.to_vec(), properties, Vec::new(), provider, scope, 1, max_depth).await
}

fn resolve_level<'a>(
    paths: Vec<PropertyPath>,
    properties: &'a Properties,
    base: PropertyPath,
    provider: &'a dyn SchemaProvider,
    scope: JoinScope,
    depth: usize,
    max_depth: usize,
) -> BoxFuture<'a, SchemaResult<Vec<RelationMap>>> {
    Box::pin(async move {
        let groups = group_by_relation(&paths, properties, scope);
        if groups.is_empty() {
            return Ok(Vec::new());
        }

        let schemas = try_join_all(groups.iter().map(|g| provider.resolve(&g.bucket_id))).await?;

        let mut maps = Vec::with_capacity(groups.len());
        for (group, target) in groups.into_iter().zip(schemas) {
            let mut path = base.clone();
            path.extend(group.prefix);

            debug!(
                path = %path.join("."),
                bucket = %target.id,
                depth,
                "Resolved relation"
            );

            let children = if group.suffixes.is_empty() {
                Vec::new()
            } else if depth >= max_depth {
                warn!(
                    path = %path.join("."),
                    max_depth,
                    "Relation depth limit reached, nested relations not joined"
                );
                Vec::new()
            } else {
                resolve_level(
                    group.suffixes,
                    &target.properties,
                    path.clone(),
                    provider,
                    scope,
                    depth + 1,
                    max_depth,
                )
                .await?
            };

            maps.push(RelationMap {
                path,
                target,
                relation_type: group.relation_type,
                children,
            });
        }
        Ok(maps)
    })
}

/// Groups paths by relation prefix, in first-appearance order
fn group_by_relation(
    paths: &[PropertyPath],
    properties: &Properties,
    scope: JoinScope,
) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();

    for path in paths {
        let Some((index, bucket_id, relation_type)) = locate_relation(properties, path) else {
            continue;
        };
        let prefix = path[..=index].to_vec();
        let suffix = path[index + 1..].to_vec();

        if suffix.is_empty() && scope == JoinScope::Predicate {
            continue;
        }

        let group = match groups.iter().position(|g| g.prefix == prefix) {
            Some(i) => &mut groups[i],
            None => {
                groups.push(Group {
                    prefix,
                    bucket_id: bucket_id.to_string(),
                    relation_type,
                    suffixes: Vec::new(),
                });
                let last = groups.len() - 1;
                &mut groups[last]
            }
        };
        if !suffix.is_empty() && !group.suffixes.contains(&suffix) {
            group.suffixes.push(suffix);
        }
    }

    groups
}

/// Finds the first relation property along `path`, following nested
/// objects and arrays. Numeric segments after an array are element indexes.
fn locate_relation<'p>(
    properties: &'p Properties,
    path: &[String],
) -> Option<(usize, &'p str, RelationType)> {
    let mut current = properties;
    let mut index = 0;

    while index < path.len() {
        let mut spec = current.get(&path[index])?;
        while let PropertySpec::Array { items } = spec {
            spec = items.as_ref();
            if path
                .get(index + 1)
                .is_some_and(|s| s.parse::<usize>().is_ok())
            {
                index += 1;
            }
        }

        match spec {
            PropertySpec::Relation {
                bucket_id,
                relation_type,
            } => return Some((index, bucket_id.as_str(), *relation_type)),
            PropertySpec::Object { properties } => current = properties,
            _ => return None,
        }
        index += 1;
    }
    None
}
