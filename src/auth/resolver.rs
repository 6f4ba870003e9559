//! Caller identity relation resolution
//!
//! Rules may read through relations on the caller (`auth.company.plan`). The
//! builder and the write guard resolve those paths against the identity
//! schema and hand the resulting join stages to an `AuthResolver`, which
//! returns the caller with the relations in object form.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::warn;

use crate::config::CompilerConfig;
use crate::error::QueryResult;
use crate::expression::{MatchExpr, PropertyPath};
use crate::pipeline::Stage;
use crate::relation::{self, to_join_stages, JoinScope};
use crate::schema::{Properties, SchemaProvider};
use crate::store::Store;

/// Materializes relations on the caller identity
pub trait AuthResolver: Send + Sync {
    /// Properties of the identity schema
    fn properties(&self) -> Properties;

    /// Applies `stages` (joins) to the caller and returns the result
    fn resolve_relations<'a>(
        &'a self,
        auth: &'a Value,
        stages: Vec<Stage>,
    ) -> BoxFuture<'a, QueryResult<Value>>;
}

impl<T: AuthResolver + ?Sized> AuthResolver for Arc<T> {
    fn properties(&self) -> Properties {
        (**self).properties()
    }

    fn resolve_relations<'a>(
        &'a self,
        auth: &'a Value,
        stages: Vec<Stage>,
    ) -> BoxFuture<'a, QueryResult<Value>> {
        (**self).resolve_relations(auth, stages)
    }
}

/// Returns the caller with every relation crossed by `auth_paths` joined.
///
/// Paths are relative to the identity root. Without relation crossings the
/// caller is returned unchanged and no resolver call is made.
pub async fn materialize_auth(
    resolver: &dyn AuthResolver,
    provider: &dyn SchemaProvider,
    config: &CompilerConfig,
    auth: &Value,
    auth_paths: &[PropertyPath],
) -> QueryResult<Value> {
    if auth_paths.is_empty() {
        return Ok(auth.clone());
    }

    let properties = resolver.properties();
    let maps = relation::resolve(
        auth_paths,
        &properties,
        provider,
        JoinScope::Predicate,
        config.max_relation_depth,
    )
    .await?;
    if maps.is_empty() {
        return Ok(auth.clone());
    }

    resolver
        .resolve_relations(auth, to_join_stages(&maps, None, config))
        .await
}

/// Identity without relations; the caller is used as given
#[derive(Debug, Clone, Default)]
pub struct StaticAuthResolver {
    properties: Properties,
}

impl StaticAuthResolver {
    pub fn new(properties: Properties) -> Self {
        Self { properties }
    }
}

impl AuthResolver for StaticAuthResolver {
    fn properties(&self) -> Properties {
        self.properties.clone()
    }

    fn resolve_relations<'a>(
        &'a self,
        auth: &'a Value,
        _stages: Vec<Stage>,
    ) -> BoxFuture<'a, QueryResult<Value>> {
        Box::pin(async move { Ok(auth.clone()) })
    }
}

/// Resolves caller relations through the identity collection of a store
pub struct StoreAuthResolver<S> {
    store: S,
    collection: String,
    properties: Properties,
}

impl<S: Store> StoreAuthResolver<S> {
    pub fn new(store: S, collection: impl Into<String>, properties: Properties) -> Self {
        Self {
            store,
            collection: collection.into(),
            properties,
        }
    }
}

impl<S: Store> AuthResolver for StoreAuthResolver<S> {
    fn properties(&self) -> Properties {
        self.properties.clone()
    }

    fn resolve_relations<'a>(
        &'a self,
        auth: &'a Value,
        stages: Vec<Stage>,
    ) -> BoxFuture<'a, QueryResult<Value>> {
        Box::pin(async move {
            if stages.is_empty() {
                return Ok(auth.clone());
            }

            let Some(id) = auth.get("_id").filter(|id| !id.is_null()) else {
                warn!("Caller has no _id, auth relations left unresolved");
                return Ok(auth.clone());
            };

            let mut pipeline = vec![
                Stage::Match(MatchExpr::eq("_id", id.clone())),
                Stage::Limit(1),
                Stage::ReplaceWith(auth.clone()),
            ];
            pipeline.extend(stages);

            let resolved = self.store.aggregate(&self.collection, &pipeline).await?;
            match resolved.into_iter().next() {
                Some(identity) => Ok(identity),
                None => {
                    warn!(
                        collection = %self.collection,
                        "Caller identity not found, auth relations left unresolved"
                    );
                    Ok(auth.clone())
                }
            }
        })
    }
}
