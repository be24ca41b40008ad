//! CLI command implementations
//!
//! `search` loads documents into an in-memory store and answers one request
//! through the standard transformer chain. `explain` runs the request-side
//! query rewrites only and prints the result.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::config::EngineConfig;
use crate::expr::PathTemplate;
use crate::model::{SearchRequest, SearchResult};
use crate::store::{MapBackedStore, Searchable, TransformingStore};
use crate::transform::{
    DeepPagingTransformer, LuceneTransformer, PushDownNotTransformer, SimplifyTransformer,
    SourceFormatAggTransformer, Transformer, TransformerChain, XformTransformer,
};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_json_file, read_request, write_error, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command. Failures are
/// reported on stdout as an error response and returned to the caller.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command).map_err(|e| {
        // stdout may be gone; the caller still reports on stderr
        let _ = write_error(e.code_str(), e.message());
        e
    })
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Search {
            docs,
            request,
            config,
        } => search(&docs, request.as_deref(), config.as_deref()),
        Command::Explain { request } => explain(request.as_deref()),
    }
}

/// Answer one search request over a JSON document file
pub fn search(
    docs_path: &Path,
    request_path: Option<&Path>,
    config_path: Option<&Path>,
) -> CliResult<()> {
    let config = load_config(config_path)?;
    config.apply_logging();

    let docs: Vec<Value> = read_json_file(docs_path)?;
    let request: SearchRequest = read_request(request_path)?;

    let result = search_documents(config, docs, &request)?;
    write_response(serde_json::to_value(result)?)
}

/// Print the request as rewritten before it reaches a store
pub fn explain(request_path: Option<&Path>) -> CliResult<()> {
    let request: SearchRequest = read_request(request_path)?;
    let rewritten = explain_request(request)?;
    write_response(serde_json::to_value(rewritten)?)
}

fn load_config(config_path: Option<&Path>) -> CliResult<EngineConfig> {
    match config_path {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::default()),
    }
}

/// In-memory store over `docs` behind the standard transformer chain
pub fn build_store(
    config: EngineConfig,
    docs: Vec<Value>,
) -> CliResult<TransformingStore<Value, MapBackedStore<Value>>> {
    if let Some(position) = docs.iter().position(|doc| !doc.is_object()) {
        return Err(CliError::invalid_input(format!(
            "document {} is not a JSON object",
            position
        )));
    }

    let evaluator = Arc::new(PathTemplate);
    let chain = TransformerChain::new()
        .with(LuceneTransformer::default())
        .with(SimplifyTransformer)
        .with(PushDownNotTransformer)
        .with(XformTransformer::new(evaluator.clone()))
        .with(SourceFormatAggTransformer)
        .with(DeepPagingTransformer::new(config.id_field.as_str()));
    let store = MapBackedStore::with_items(config, docs)?.with_evaluator(evaluator);
    Ok(TransformingStore::new(chain, store))
}

pub fn search_documents(
    config: EngineConfig,
    docs: Vec<Value>,
    request: &SearchRequest,
) -> CliResult<SearchResult<Value>> {
    let store = build_store(config, docs)?;
    Ok(store.search(request)?)
}

pub fn explain_request(request: SearchRequest) -> CliResult<SearchRequest> {
    let request =
        Transformer::<Value>::transform_request(&LuceneTransformer::default(), request)?;
    let request = Transformer::<Value>::transform_request(&SimplifyTransformer, request)?;
    Ok(Transformer::<Value>::transform_request(
        &PushDownNotTransformer,
        request,
    )?)
}

#[cfg(test)]
mod tests {
    use super::super::errors::CliErrorCode;
    use super::*;
    use crate::agg::Agg;
    use crate::query::Query;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn docs() -> Vec<Value> {
        vec![
            json!({"id": "a", "kind": "x", "size": 3}),
            json!({"id": "b", "kind": "y", "size": 5}),
            json!({"id": "c", "kind": "x"}),
        ]
    }

    #[test]
    fn test_search_documents() {
        let request = SearchRequest::new()
            .with_query(Query::not(vec![Query::term("kind", "y")]))
            .with_aggs(vec![Agg::terms("kind", 10)]);
        let result = search_documents(EngineConfig::default(), docs(), &request).unwrap();
        assert_eq!(result.total_items, 2);
        assert_eq!(result.aggs["kind"].bucket(&json!("x")).unwrap().count, 2);
    }

    #[test]
    fn test_build_store_rejects_non_objects() {
        let err = build_store(EngineConfig::default(), vec![json!(1)]).err().unwrap();
        assert_eq!(err.code(), &CliErrorCode::InvalidInput);
    }

    #[test]
    fn test_search_error_maps_to_cli_error() {
        let request = SearchRequest::new().with_query(Query::named("unknown", None));
        let err = search_documents(EngineConfig::default(), docs(), &request).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::SearchFailed);
        assert!(err.message().starts_with("QUERY_UNSUPPORTED"));
    }

    #[test]
    fn test_explain_pushes_not_down() {
        let request = SearchRequest::new().with_query(Query::not(vec![Query::or(vec![
            Query::term("a", 1),
            Query::term("b", 2),
        ])]));
        let out = explain_request(request).unwrap();
        assert_eq!(
            out.query,
            Some(Query::and(vec![
                Query::not(vec![Query::term("a", 1)]),
                Query::not(vec![Query::term("b", 2)]),
            ]))
        );
    }

    #[test]
    fn test_search_accepts_lucene_queries() {
        let request = SearchRequest::new().with_query(Query::Lucene {
            query: "kind:x -size:[* TO 3]".into(),
            default_field: None,
        });
        let result = search_documents(EngineConfig::default(), docs(), &request).unwrap();
        assert_eq!(result.total_items, 1);
        assert_eq!(result.items.unwrap()[0]["id"], "c");
    }

    #[test]
    fn test_search_reads_files() {
        let temp_dir = TempDir::new().unwrap();
        let docs_path = temp_dir.path().join("docs.json");
        let request_path = temp_dir.path().join("request.json");
        let config_path = temp_dir.path().join("docquery.json");
        fs::write(&docs_path, Value::Array(docs()).to_string()).unwrap();
        let request = json!({"query": {"op": "term", "field": "kind", "value": "x"}});
        fs::write(&request_path, request.to_string()).unwrap();
        fs::write(&config_path, json!({"id_field": "id"}).to_string()).unwrap();

        search(&docs_path, Some(&request_path), Some(&config_path)).unwrap();
    }

    #[test]
    fn test_config_errors_are_reported() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("docquery.json");
        fs::write(&config_path, json!({"stream_limit": 0}).to_string()).unwrap();

        let err = load_config(Some(&config_path)).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }
}
