//! CLI command implementations
//!
//! Both commands load the schema registry and an in-memory store, then go
//! through `BucketDataService` exactly like an embedding server would.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::auth::{AuthResolver, StaticAuthResolver, StoreAuthResolver};
use crate::config::CompilerConfig;
use crate::observability;
use crate::pipeline::FindRequest;
use crate::schema::{InMemorySchemaProvider, SchemaProvider};
use crate::service::BucketDataService;
use crate::store::{InMemoryStore, Store};

use super::args::{Command, QuerySource};
use super::errors::{CliError, CliResult};
use super::io::{read_json_file, read_request, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Runtime(format!("Failed to create tokio runtime: {}", e)))?;

    let output = match cmd {
        Command::Explain { source } => rt.block_on(explain(&source))?,
        Command::Find { source, data } => rt.block_on(find(&source, data.as_deref()))?,
    };

    write_response(output)
}

/// Compile the request and return the pipeline without running it
pub async fn explain(source: &QuerySource) -> CliResult<Value> {
    let session = Session::open(source, None).await?;
    let stages = session
        .service
        .compile(&source.bucket, &session.request, &session.auth)
        .await?;

    Ok(json!({
        "bucket": source.bucket,
        "collection": session.service.config().data_collection(&source.bucket),
        "pipeline": serde_json::to_value(&stages)?,
    }))
}

/// Compile and run the request against the seeded store
pub async fn find(source: &QuerySource, data: Option<&Path>) -> CliResult<Value> {
    let session = Session::open(source, data).await?;
    let result = session
        .service
        .find(&source.bucket, &session.request, &session.auth)
        .await?;

    Ok(serde_json::to_value(&result)?)
}

/// Everything one invocation needs
struct Session {
    service: BucketDataService,
    request: FindRequest,
    auth: Value,
}

impl Session {
    async fn open(source: &QuerySource, data: Option<&Path>) -> CliResult<Self> {
        let config = match &source.config {
            Some(path) => CompilerConfig::load(path)?,
            None => CompilerConfig::default(),
        };
        observability::init(&config.log);

        let provider = Arc::new(InMemorySchemaProvider::load_file(&source.schemas)?);

        let store = Arc::new(InMemoryStore::new());
        if let Some(path) = data {
            seed(&store, read_json_file(path)?)?;
        }

        let auth_resolver: Arc<dyn AuthResolver> = match &source.identity_bucket {
            Some(identity) => {
                let schema = provider.resolve(identity).await?;
                Arc::new(StoreAuthResolver::new(
                    store.clone(),
                    config.identity_collection.clone(),
                    schema.properties,
                ))
            }
            None => Arc::new(StaticAuthResolver::default()),
        };

        let request = match &source.request {
            Some(path) => read_json_file(path)?,
            None => read_request()?,
        };
        let auth = match &source.auth {
            Some(path) => read_json_file(path)?,
            None => Value::Object(Map::new()),
        };

        let store: Arc<dyn Store> = store;
        Ok(Self {
            service: BucketDataService::new(provider, auth_resolver, store, config),
            request,
            auth,
        })
    }
}

fn seed(store: &InMemoryStore, data: Value) -> CliResult<()> {
    let Value::Object(collections) = data else {
        return Err(CliError::input(
            "data must be an object mapping collection names to document arrays",
        ));
    };

    for (collection, documents) in collections {
        let Value::Array(documents) = documents else {
            return Err(CliError::input(format!(
                "collection '{}' must be an array of documents",
                collection
            )));
        };
        debug!(collection = %collection, count = documents.len(), "Seeding collection");
        store.seed(&collection, documents)?;
    }
    Ok(())
}
