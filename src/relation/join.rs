//! Join stage emission and deduplication

use crate::config::CompilerConfig;
use crate::locale::Locale;
use crate::pipeline::{Lookup, Stage};

use super::map::RelationMap;
use super::set::RelationSet;

/// One `Lookup` per node, parent before children, so nested joins see the
/// parent already in object form.
///
/// Localizable targets get a `Localize` sub-stage when a locale is given.
pub fn to_join_stages(
    maps: &[RelationMap],
    locale: Option<&Locale>,
    config: &CompilerConfig,
) -> Vec<Stage> {
    let mut stages = Vec::new();
    for map in maps {
        let mut pipeline = Vec::new();
        if let Some(locale) = locale {
            let paths = map.target.translatable_paths();
            if !paths.is_empty() {
                pipeline.push(Stage::Localize {
                    paths,
                    locale: locale.clone(),
                });
            }
        }

        stages.push(Stage::Lookup(Lookup {
            path: map.path.clone(),
            from: config.data_collection(&map.target.id),
            relation_type: map.relation_type,
            pipeline,
            keep_reference: false,
        }));
        stages.extend(to_join_stages(&map.children, locale, config));
    }
    stages
}

/// Drops nodes already joined. Children of a dropped node that are not
/// joined yet are kept as residual roots with their absolute paths.
pub fn dedupe_against_used(maps: Vec<RelationMap>, used: &RelationSet) -> Vec<RelationMap> {
    let mut kept = Vec::new();
    for map in maps {
        if used.contains(&map.path) {
            kept.extend(dedupe_against_used(map.children, used));
        } else {
            kept.push(map);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::PropertyPath;
    use crate::schema::{Properties, PropertySpec, RelationType, Schema};

    fn p(path: &str) -> PropertyPath {
        path.split('.').map(str::to_string).collect()
    }

    fn node(path: &str, target: Schema, children: Vec<RelationMap>) -> RelationMap {
        RelationMap {
            path: p(path),
            target,
            relation_type: RelationType::OneToOne,
            children,
        }
    }

    fn localized() -> Schema {
        let mut props = Properties::new();
        props.insert("bio".into(), PropertySpec::translatable_string());
        Schema::new("people", props)
    }

    fn plain(id: &str) -> Schema {
        Schema::new(id, Properties::new())
    }

    #[test]
    fn test_join_stages_parent_first_with_localization() {
        let maps = vec![node(
            "author",
            localized(),
            vec![node("author.company", plain("companies"), vec![])],
        )];
        let locale = Locale::new("tr_TR", "en_US");
        let stages = to_join_stages(&maps, Some(&locale), &CompilerConfig::default());

        assert_eq!(stages.len(), 2);
        let Stage::Lookup(first) = &stages[0] else {
            panic!("expected lookup");
        };
        assert_eq!(first.from, "bucket_people");
        assert_eq!(first.pipeline.len(), 1);

        let Stage::Lookup(second) = &stages[1] else {
            panic!("expected lookup");
        };
        assert_eq!(second.path, p("author.company"));
        assert!(second.pipeline.is_empty());

        let unlocalized = to_join_stages(&maps, None, &CompilerConfig::default());
        assert!(matches!(&unlocalized[0], Stage::Lookup(l) if l.pipeline.is_empty()));
    }

    #[test]
    fn test_dedupe_keeps_residual_children() {
        let maps = vec![
            node(
                "author",
                plain("people"),
                vec![node("author.company", plain("companies"), vec![])],
            ),
            node("editor", plain("people"), vec![]),
        ];

        let mut used = RelationSet::new();
        used.insert_maps(&[node("author", plain("people"), vec![])]);

        let deduped = dedupe_against_used(maps, &used);
        let paths: Vec<_> = deduped.iter().map(|m| m.path.clone()).collect();
        assert_eq!(paths, vec![p("author.company"), p("editor")]);
    }
}
