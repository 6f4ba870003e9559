//! Read pipeline builder
//!
//! Steps consume the builder and return it, so the accumulated state (joined
//! relations, whether anything narrowed the result set) is threaded from
//! step to step. Call them in this order; each is a no-op when its input is
//! absent:
//!
//! 1. `find_one_if_requested`
//! 2. `filter_resources`
//! 3. `localize`
//! 4. `apply_read_rule`
//! 5. `reset_non_overlapping_relations`
//! 6. `apply_user_filter`
//! 7. `resolve_output_relations`
//! 8. `paginate`, then `build`
//!
//! Relations joined only to evaluate the rule or the filter are turned back
//! into references before the caller sees them.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::debug;

use crate::auth::{materialize_auth, AuthResolver};
use crate::config::CompilerConfig;
use crate::error::QueryResult;
use crate::expression::{split_by_root, translate_filter, MatchExpr, PropertyPath, Rule};
use crate::locale::Locale;
use crate::relation::{
    self, dedupe_against_used, is_requested, to_join_stages, JoinScope, RelationSet,
};
use crate::schema::{Schema, SchemaProvider};

use super::request::Filter;
use super::stage::{SortSpec, Stage};

/// Field carrying the total inside the `meta` facet branch
pub const TOTAL_FIELD: &str = "total";

#[derive(Debug, Clone, Copy)]
struct Pagination {
    estimated_total: Option<u64>,
}

/// Assembles the stage list of one find request
pub struct PipelineBuilder<'a> {
    schema: &'a Schema,
    provider: &'a dyn SchemaProvider,
    auth_resolver: &'a dyn AuthResolver,
    config: &'a CompilerConfig,

    locale: Option<Locale>,
    requested: Vec<PropertyPath>,
    used: RelationSet,

    stages: Vec<Stage>,
    sort: Vec<SortSpec>,
    skip: Option<u64>,
    limit: Option<u64>,
    output_joins: Vec<Stage>,
    projection: Vec<PropertyPath>,
    pagination: Option<Pagination>,

    is_scoped: bool,
    is_rule_applied: bool,
    is_filter_applied: bool,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(
        schema: &'a Schema,
        provider: &'a dyn SchemaProvider,
        auth_resolver: &'a dyn AuthResolver,
        config: &'a CompilerConfig,
    ) -> Self {
        Self {
            schema,
            provider,
            auth_resolver,
            config,
            locale: None,
            requested: Vec::new(),
            used: RelationSet::new(),
            stages: Vec::new(),
            sort: Vec::new(),
            skip: None,
            limit: None,
            output_joins: Vec::new(),
            projection: Vec::new(),
            pagination: None,
            is_scoped: false,
            is_rule_applied: false,
            is_filter_applied: false,
        }
    }

    /// Relations the caller wants in object form. Must be set before
    /// `reset_non_overlapping_relations` so requested joins survive.
    pub fn request_relations(mut self, paths: Vec<PropertyPath>) -> Self {
        self.requested = paths;
        self
    }

    pub fn find_one_if_requested(mut self, document_id: Option<&str>) -> Self {
        if let Some(id) = document_id {
            self.stages.push(Stage::Match(MatchExpr::eq("_id", json!(id))));
            self.is_scoped = true;
        }
        self
    }

    /// Scopes the result with a predicate from an outer layer
    pub fn filter_resources(mut self, resource_filter: Option<MatchExpr>) -> Self {
        if let Some(filter) = resource_filter.filter(|f| !f.is_trivially_true()) {
            self.stages.push(Stage::Match(filter));
            self.is_scoped = true;
        }
        self
    }

    /// Resolves the request locale and localizes the bucket's own fields.
    /// Joined documents are localized with the same locale.
    pub fn localize(mut self, language: Option<&str>, enabled: bool) -> Self {
        if !enabled {
            return self;
        }

        let locale = Locale::resolve(language, &self.config.localization);
        let paths = self.schema.translatable_paths();
        if !paths.is_empty() {
            self.stages.push(Stage::Localize {
                paths,
                locale: locale.clone(),
            });
        }
        self.locale = Some(locale);
        self
    }

    /// Joins what the read rule needs and appends its match.
    ///
    /// The allow-all rule adds nothing.
    pub async fn apply_read_rule(mut self, auth: &Value) -> QueryResult<Self> {
        let rule = Rule::parse(&self.schema.acl.read)?;
        if rule.is_default() {
            debug!(bucket = %self.schema.id, "Default read rule, no match stage");
            return Ok(self);
        }

        let (auth_paths, document_paths) = split_by_root(&rule.property_map());
        let auth = self.materialize_auth(auth, &auth_paths).await?;
        let fragment = rule.aggregate(&auth);

        match fragment.constant() {
            Some(true) => {
                debug!(bucket = %self.schema.id, "Read rule holds for caller");
                return Ok(self);
            }
            Some(false) => {
                debug!(bucket = %self.schema.id, "Read rule denies caller");
            }
            None => self.join_for_predicate(&document_paths).await?,
        }

        self.stages.push(Stage::Match(fragment));
        self.is_rule_applied = true;
        Ok(self)
    }

    /// Turns relations joined for the rule back into references unless the
    /// caller requested them
    pub fn reset_non_overlapping_relations(mut self) -> Self {
        self.push_resets();
        self
    }

    /// Joins what the filter needs and appends its match.
    ///
    /// Text filters use the rule language and may read `auth`; object
    /// filters only address document fields.
    pub async fn apply_user_filter(mut self, filter: Option<&Filter>, auth: &Value) -> QueryResult<Self> {
        let Some(filter) = filter else {
            return Ok(self);
        };

        let (fragment, document_paths) = match filter {
            Filter::Expression(source) => {
                let rule = Rule::parse(source)?;
                let (auth_paths, document_paths) = split_by_root(&rule.property_map());
                let auth = self.materialize_auth(auth, &auth_paths).await?;
                (rule.aggregate(&auth), document_paths)
            }
            Filter::Object(object) => {
                let translated = translate_filter(&Value::Object(object.clone()))?;
                let (_, document_paths) = split_by_root(&translated.paths);
                (translated.fragment, document_paths)
            }
        };

        if fragment.is_trivially_true() {
            return Ok(self);
        }

        if fragment.constant().is_none() {
            self.join_for_predicate(&document_paths).await?;
        }
        self.stages.push(Stage::Match(fragment));
        self.is_filter_applied = true;

        self.push_resets();
        Ok(self)
    }

    /// Joins requested relations that are not joined yet, after paging
    pub async fn resolve_output_relations(mut self) -> QueryResult<Self> {
        if self.requested.is_empty() {
            return Ok(self);
        }

        let maps = relation::resolve(
            &self.requested,
            &self.schema.properties,
            self.provider,
            JoinScope::Output,
            self.config.max_relation_depth,
        )
        .await?;
        let maps = dedupe_against_used(maps, &self.used);

        self.output_joins = to_join_stages(&maps, self.locale.as_ref(), self.config);
        self.used.insert_maps(&maps);
        debug!(joins = self.output_joins.len(), "Resolved output relations");
        Ok(self)
    }

    pub fn sort(mut self, sort: Vec<SortSpec>) -> Self {
        self.sort = sort;
        self
    }

    pub fn skip(mut self, skip: Option<u64>) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn project(mut self, paths: Vec<PropertyPath>) -> Self {
        self.projection = paths;
        self
    }

    /// True when a rule, filter or scope narrowed the set, so `meta.total`
    /// must be counted rather than estimated
    pub fn needs_exact_count(&self) -> bool {
        self.is_scoped || self.is_rule_applied || self.is_filter_applied
    }

    /// Requests the `{meta, data}` facet. `estimated_total` is used only when
    /// nothing narrowed the set.
    pub fn paginate(mut self, enabled: bool, estimated_total: Option<u64>) -> Self {
        self.pagination = enabled.then_some(Pagination { estimated_total });
        self
    }

    /// Final stage list
    pub fn build(mut self) -> Vec<Stage> {
        let seeking = self.seeking_stages();
        let exact = self.needs_exact_count();

        match self.pagination {
            None => self.stages.extend(seeking),
            Some(pagination) => {
                let meta = if exact {
                    vec![Stage::Count {
                        field: TOTAL_FIELD.to_string(),
                    }]
                } else {
                    vec![
                        Stage::Limit(1),
                        Stage::ReplaceWith(
                            json!({ TOTAL_FIELD: pagination.estimated_total.unwrap_or(0) }),
                        ),
                    ]
                };

                let mut branches = BTreeMap::new();
                branches.insert("meta".to_string(), meta);
                branches.insert("data".to_string(), seeking);
                self.stages.push(Stage::Facet(branches));
            }
        }

        debug!(
            bucket = %self.schema.id,
            stages = self.stages.len(),
            rule_applied = self.is_rule_applied,
            filter_applied = self.is_filter_applied,
            "Built read pipeline"
        );
        self.stages
    }

    fn seeking_stages(&mut self) -> Vec<Stage> {
        let mut seeking = Vec::new();
        if !self.sort.is_empty() {
            seeking.push(Stage::Sort(std::mem::take(&mut self.sort)));
        }
        if let Some(skip) = self.skip.filter(|s| *s > 0) {
            seeking.push(Stage::Skip(skip));
        }
        if let Some(limit) = self.limit {
            seeking.push(Stage::Limit(limit));
        }
        seeking.append(&mut self.output_joins);
        if !self.projection.is_empty() {
            seeking.push(Stage::Project(std::mem::take(&mut self.projection)));
        }
        seeking
    }

    async fn materialize_auth(&self, auth: &Value, auth_paths: &[PropertyPath]) -> QueryResult<Value> {
        materialize_auth(self.auth_resolver, self.provider, self.config, auth, auth_paths).await
    }

    async fn join_for_predicate(&mut self, document_paths: &[PropertyPath]) -> QueryResult<()> {
        let maps = relation::resolve(
            document_paths,
            &self.schema.properties,
            self.provider,
            JoinScope::Predicate,
            self.config.max_relation_depth,
        )
        .await?;
        let maps = dedupe_against_used(maps, &self.used);
        if maps.is_empty() {
            return Ok(());
        }

        // Unrequested joins are reset after the match and restore the stored reference
        let mut joins = to_join_stages(&maps, self.locale.as_ref(), self.config);
        for stage in joins.iter_mut() {
            if let Stage::Lookup(lookup) = stage {
                lookup.keep_reference = !is_requested(&lookup.path, &self.requested);
            }
        }
        self.stages.extend(joins);
        self.used.insert_maps(&maps);
        Ok(())
    }

    fn push_resets(&mut self) {
        for (path, relation_type) in self.used.take_unrequested(&self.requested) {
            debug!(path = %path.join("."), "Resetting relation to reference form");
            self.stages.push(Stage::Reset {
                path,
                relation_type,
            });
        }
    }
}

/// Shapes a paginated result as `{meta: {total}, data}`. An empty facet
/// result (nothing matched) becomes `{meta: {total: 0}, data: []}`.
pub fn normalize_paginated(results: Vec<Value>) -> Value {
    let first = results.into_iter().next().unwrap_or(Value::Null);

    let meta = first
        .get("meta")
        .and_then(|m| m.get(0))
        .cloned()
        .unwrap_or_else(|| json!({ TOTAL_FIELD: 0 }));
    let data = first
        .get("data")
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));

    json!({ "meta": meta, "data": data })
}
