//! Reference stage interpreter
//!
//! Executes a stage list over an in-memory document stream. Joins look up
//! referenced documents through a `(collection, id)` finder so the
//! interpreter stays independent of how collections are held.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::expression::value::{compare, get_path, split_field};
use crate::expression::PropertyPath;
use crate::locale::Locale;
use crate::pipeline::{Lookup, SortDirection, SortSpec, Stage};
use crate::schema::RelationType;

/// Finds a document by collection and `_id`
pub type Finder<'a> = dyn Fn(&str, &str) -> Option<Value> + 'a;

/// Runs `stages` over `documents`
pub fn execute_stages(stages: &[Stage], mut documents: Vec<Value>, find: &Finder<'_>) -> Vec<Value> {
    for stage in stages {
        documents = match stage {
            Stage::Match(expr) => {
                documents.retain(|doc| expr.matches(doc));
                documents
            }
            Stage::Lookup(lookup) => {
                for doc in documents.iter_mut() {
                    join(doc, lookup, find);
                }
                documents
            }
            Stage::Reset {
                path,
                relation_type,
            } => {
                for doc in documents.iter_mut() {
                    reset(doc, path, *relation_type);
                }
                documents
            }
            Stage::Localize { paths, locale } => {
                for doc in documents.iter_mut() {
                    for path in paths {
                        update_at_path(doc, path, &mut |current| {
                            current.map(|value| localize(value, locale))
                        });
                    }
                }
                documents
            }
            Stage::ReplaceWith(value) => documents.iter().map(|_| value.clone()).collect(),
            Stage::Documents(literal) => literal.clone(),
            Stage::Project(paths) => documents.iter().map(|doc| project(doc, paths)).collect(),
            Stage::Sort(specs) => {
                documents.sort_by(|a, b| compare_by(a, b, specs));
                documents
            }
            Stage::Skip(n) => documents.into_iter().skip(*n as usize).collect(),
            Stage::Limit(n) => documents.into_iter().take(*n as usize).collect(),
            Stage::Count { field } => {
                if documents.is_empty() {
                    Vec::new()
                } else {
                    let mut out = Map::new();
                    out.insert(field.clone(), Value::from(documents.len() as u64));
                    vec![Value::Object(out)]
                }
            }
            Stage::Facet(branches) => {
                let mut out = Map::new();
                for (name, branch) in branches {
                    let result = execute_stages(branch, documents.clone(), find);
                    out.insert(name.clone(), Value::Array(result));
                }
                vec![Value::Object(out)]
            }
        };
    }
    documents
}

/// Prefix of the field holding a joined relation's stored reference
const REFERENCE_PREFIX: &str = "__ref_";

fn reference_key(field: &str) -> String {
    format!("{}{}", REFERENCE_PREFIX, field)
}

/// Calls `apply` with every object that holds the last segment of `path`,
/// and that segment. Arrays on the way are mapped over; a numeric segment
/// indexes into an array.
fn visit_parents(
    value: &mut Value,
    path: &[String],
    apply: &mut dyn FnMut(&mut Map<String, Value>, &str),
) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };

    match value {
        Value::Object(map) => {
            if rest.is_empty() {
                apply(map, head);
            } else if let Some(child) = map.get_mut(head) {
                visit_parents(child, rest, apply);
            }
        }
        Value::Array(items) => match head.parse::<usize>() {
            Ok(index) => {
                if let Some(item) = items.get_mut(index) {
                    visit_parents(item, rest, apply);
                }
            }
            Err(_) => {
                for item in items.iter_mut() {
                    visit_parents(item, path, apply);
                }
            }
        },
        _ => {}
    }
}

/// Applies `apply` to the value at `path`. Returning `None` removes the key.
fn update_at_path(
    value: &mut Value,
    path: &[String],
    apply: &mut dyn FnMut(Option<Value>) -> Option<Value>,
) {
    visit_parents(value, path, &mut |map, key| {
        if let Some(updated) = apply(map.remove(key)) {
            map.insert(key.to_string(), updated);
        }
    });
}

fn join(document: &mut Value, lookup: &Lookup, find: &Finder<'_>) {
    let fetch = |id: &Value| -> Option<Value> {
        let joined = find(&lookup.from, id.as_str()?)?;
        if lookup.pipeline.is_empty() {
            return Some(joined);
        }
        execute_stages(&lookup.pipeline, vec![joined], find)
            .into_iter()
            .next()
    };

    visit_parents(document, &lookup.path, &mut |map, key| {
        let Some(current) = map.remove(key) else {
            return;
        };
        let joined = match lookup.relation_type {
            RelationType::OneToOne => fetch(&current).unwrap_or(Value::Null),
            RelationType::OneToMany => match &current {
                Value::Array(ids) => Value::Array(ids.iter().filter_map(&fetch).collect()),
                _ => Value::Array(Vec::new()),
            },
        };
        if lookup.keep_reference {
            map.insert(reference_key(key), current);
        }
        map.insert(key.to_string(), joined);
    });
}

/// Puts the stored reference back when the join kept one; otherwise derives
/// it from the joined object(s)
fn reset(document: &mut Value, path: &[String], relation_type: RelationType) {
    visit_parents(document, path, &mut |map, key| {
        let stored = map.remove(&reference_key(key));
        if let Some(current) = map.remove(key) {
            let reference = stored.unwrap_or_else(|| to_reference(current, relation_type));
            map.insert(key.to_string(), reference);
        }
    });
}

/// Joined object(s) back to `_id` form; already-reference values pass through
fn to_reference(value: Value, relation_type: RelationType) -> Value {
    let id_of = |v: Value| match v {
        Value::Object(mut map) => map.remove("_id").unwrap_or(Value::Null),
        other => other,
    };

    match (relation_type, value) {
        (RelationType::OneToOne, v) => id_of(v),
        (RelationType::OneToMany, Value::Array(items)) => {
            Value::Array(items.into_iter().map(id_of).collect())
        }
        (RelationType::OneToMany, other) => other,
    }
}

fn localize(value: Value, locale: &Locale) -> Value {
    match value {
        Value::Object(mut translations) => translations
            .remove(&locale.best)
            .or_else(|| translations.remove(&locale.fallback))
            .unwrap_or(Value::Null),
        other => other,
    }
}

fn project(document: &Value, paths: &[PropertyPath]) -> Value {
    let mut out = Value::Object(Map::new());
    if let (Some(id), Value::Object(map)) = (document.get("_id"), &mut out) {
        map.insert("_id".to_string(), id.clone());
    }
    for path in paths {
        if let Some(picked) = pick(document, path) {
            merge(&mut out, picked);
        }
    }
    out
}

/// Copies only `path` out of `value`, keeping the surrounding shape
fn pick(value: &Value, path: &[String]) -> Option<Value> {
    let Some((head, rest)) = path.split_first() else {
        return Some(value.clone());
    };

    match value {
        Value::Object(map) => {
            let inner = pick(map.get(head)?, rest)?;
            let mut out = Map::new();
            out.insert(head.clone(), inner);
            Some(Value::Object(out))
        }
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .map(|item| pick(item, path).unwrap_or_else(|| Value::Object(Map::new())))
                .collect(),
        )),
        _ => None,
    }
}

fn merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(source)) if target.len() == source.len() => {
            for (existing, value) in target.iter_mut().zip(source) {
                merge(existing, value);
            }
        }
        (target, source) => *target = source,
    }
}

// null < numbers < strings < objects < arrays < booleans
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

fn compare_by(a: &Value, b: &Value, specs: &[SortSpec]) -> Ordering {
    for spec in specs {
        let path = split_field(&spec.field);
        let (left, right) = (get_path(a, &path), get_path(b, &path));
        let ordering = type_rank(&left)
            .cmp(&type_rank(&right))
            .then_with(|| compare(&left, &right).unwrap_or(Ordering::Equal));
        let ordering = match spec.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::MatchExpr;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn people(collection: &str, id: &str) -> Option<Value> {
        if collection != "bucket_people" {
            return None;
        }
        match id {
            "p1" => Some(json!({"_id": "p1", "name": "Ada", "bio": {"en_US": "hi", "tr_TR": "selam"}})),
            "p2" => Some(json!({"_id": "p2", "name": "Linus", "bio": {"en_US": "hey"}})),
            _ => None,
        }
    }

    fn path(p: &str) -> PropertyPath {
        split_field(p)
    }

    fn lookup(p: &str, relation_type: RelationType) -> Stage {
        Stage::Lookup(Lookup {
            path: path(p),
            from: "bucket_people".into(),
            relation_type,
            pipeline: vec![],
            keep_reference: false,
        })
    }

    fn kept_lookup(p: &str, relation_type: RelationType) -> Stage {
        Stage::Lookup(Lookup {
            path: path(p),
            from: "bucket_people".into(),
            relation_type,
            pipeline: vec![],
            keep_reference: true,
        })
    }

    fn reset_stage(p: &str, relation_type: RelationType) -> Stage {
        Stage::Reset {
            path: path(p),
            relation_type,
        }
    }

    #[test]
    fn test_one_to_one_join_and_reset() {
        let docs = vec![
            json!({"_id": "a", "author": "p1"}),
            json!({"_id": "b", "author": "missing"}),
            json!({"_id": "c"}),
        ];
        let joined = execute_stages(&[lookup("author", RelationType::OneToOne)], docs, &people);
        assert_eq!(joined[0]["author"]["name"], "Ada");
        assert_eq!(joined[1]["author"], Value::Null);
        assert!(joined[2].get("author").is_none());

        let reset = execute_stages(
            &[Stage::Reset {
                path: path("author"),
                relation_type: RelationType::OneToOne,
            }],
            joined,
            &people,
        );
        assert_eq!(reset[0]["author"], "p1");
    }

    #[test]
    fn test_one_to_many_keeps_cardinality() {
        let docs = vec![json!({"_id": "a", "editors": ["p2", "nope", "p1"]})];
        let joined = execute_stages(&[lookup("editors", RelationType::OneToMany)], docs, &people);
        assert_eq!(joined[0]["editors"].as_array().unwrap().len(), 2);
        assert_eq!(joined[0]["editors"][0]["name"], "Linus");

        let reset = execute_stages(
            &[Stage::Reset {
                path: path("editors"),
                relation_type: RelationType::OneToMany,
            }],
            joined,
            &people,
        );
        assert_eq!(reset[0]["editors"], json!(["p2", "p1"]));
    }

    #[test]
    fn test_join_through_array_of_objects() {
        let docs = vec![json!({"_id": "a", "reviews": [{"by": "p1"}, {"by": "p2"}]})];
        let joined = execute_stages(&[lookup("reviews.by", RelationType::OneToOne)], docs, &people);
        assert_eq!(joined[0]["reviews"][1]["by"]["name"], "Linus");
    }

    #[test]
    fn test_lookup_subpipeline_localizes() {
        let stage = Stage::Lookup(Lookup {
            path: path("author"),
            from: "bucket_people".into(),
            relation_type: RelationType::OneToOne,
            pipeline: vec![Stage::Localize {
                paths: vec![path("bio")],
                locale: Locale::new("tr_TR", "en_US"),
            }],
            keep_reference: false,
        });
        let docs = vec![json!({"author": "p1"}), json!({"author": "p2"})];
        let out = execute_stages(&[stage], docs, &people);
        assert_eq!(out[0]["author"]["bio"], "selam");
        assert_eq!(out[1]["author"]["bio"], "hey");
    }

    #[test]
    fn test_sort_skip_limit_project() {
        let docs = vec![
            json!({"_id": "1", "n": 3, "x": {"y": 1, "z": 2}}),
            json!({"_id": "2", "n": 1, "x": {"y": 5}}),
            json!({"_id": "3", "x": {"y": 9}}),
            json!({"_id": "4", "n": 2}),
        ];
        let stages = vec![
            Stage::Sort(vec![SortSpec::desc("n")]),
            Stage::Skip(1),
            Stage::Limit(2),
            Stage::Project(vec![path("x.y")]),
        ];
        let out = execute_stages(&stages, docs, &people);
        assert_eq!(out, vec![json!({"_id": "4"}), json!({"_id": "2", "x": {"y": 5}})]);
    }

    #[test]
    fn test_count_on_empty_stream_yields_nothing() {
        let count = Stage::Count {
            field: "total".into(),
        };
        assert!(execute_stages(&[count.clone()], vec![], &people).is_empty());
        assert_eq!(
            execute_stages(&[count], vec![json!({}), json!({})], &people),
            vec![json!({"total": 2})]
        );
    }

    #[test]
    fn test_facet_runs_branches_over_same_input() {
        let mut branches = BTreeMap::new();
        branches.insert(
            "meta".to_string(),
            vec![Stage::Count {
                field: "total".into(),
            }],
        );
        branches.insert("data".to_string(), vec![Stage::Limit(1)]);

        let docs = vec![json!({"_id": "1"}), json!({"_id": "2"})];
        let stages = vec![
            Stage::Match(MatchExpr::always()),
            Stage::Facet(branches),
        ];
        let out = execute_stages(&stages, docs, &people);
        assert_eq!(
            out,
            vec![json!({"meta": [{"total": 2}], "data": [{"_id": "1"}]})]
        );
    }

    #[test]
    fn test_replace_with() {
        let out = execute_stages(
            &[Stage::Limit(1), Stage::ReplaceWith(json!({"k": 1}))],
            vec![json!({}), json!({})],
            &people,
        );
        assert_eq!(out, vec![json!({"k": 1})]);
    }

    #[test]
    fn test_kept_reference_restores_dangling_ids() {
        let docs = vec![json!({
            "_id": "a",
            "author": "ghost",
            "editors": ["p1", "gone", "p2"]
        })];
        let stages = vec![
            kept_lookup("author", RelationType::OneToOne),
            kept_lookup("editors", RelationType::OneToMany),
        ];
        let joined = execute_stages(&stages, docs.clone(), &people);
        assert_eq!(joined[0]["author"], Value::Null);
        assert_eq!(joined[0]["editors"].as_array().unwrap().len(), 2);

        let reset = execute_stages(
            &[
                reset_stage("author", RelationType::OneToOne),
                reset_stage("editors", RelationType::OneToMany),
            ],
            joined,
            &people,
        );
        assert_eq!(reset, docs);
    }

    #[test]
    fn test_kept_reference_inside_arrays() {
        let docs = vec![json!({"_id": "a", "reviews": [{"by": "p1"}, {"by": "nobody"}]})];
        let joined = execute_stages(
            &[kept_lookup("reviews.by", RelationType::OneToOne)],
            docs.clone(),
            &people,
        );
        assert_eq!(joined[0]["reviews"][0]["by"]["name"], "Ada");

        let reset = execute_stages(
            &[reset_stage("reviews.by", RelationType::OneToOne)],
            joined,
            &people,
        );
        assert_eq!(reset, docs);
    }

    #[test]
    fn test_documents_replaces_stream() {
        let out = execute_stages(
            &[
                Stage::Documents(vec![json!({"author": "p2"})]),
                lookup("author", RelationType::OneToOne),
            ],
            vec![json!({}), json!({})],
            &people,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["author"]["name"], "Linus");
    }
}
