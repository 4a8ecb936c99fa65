//! CLI command implementations
//!
//! `check` loads a config file and prints what each resource derives to.
//! `replay` binds every configured resource to one in-memory store and
//! runs JSON-lines operations against it, one response line per operation.
//!
//! Operation shape:
//!
//! ```text
//! {"op": "create" | "replace" | "patch" | "delete" | "read",
//!  "resource": "people", "id": "p1", "data": {...},
//!  "if_match": "...", "if_none_match": "...", "version": 3 | "all" | "diffs"}
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::{ConfigLoader, ResourceRegistry};
use crate::document::Document;
use crate::observability::{log_event_with_fields, Event, Logger, Severity, VersioningMetrics};
use crate::store::InMemoryStore;
use crate::versioning::{
    ReadOutcome, VersionSelector, VersionedCollection, VersioningError, VersioningResult,
    WriteOutcome,
};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{read_lines, write_error, write_response};

/// Operation kinds accepted by `replay`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Create,
    Replace,
    Patch,
    Delete,
    Read,
}

/// One replayed operation
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayRequest {
    pub op: OpKind,
    pub resource: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub data: Option<Document>,
    #[serde(default)]
    pub if_match: Option<String>,
    #[serde(default)]
    pub if_none_match: Option<String>,
    /// Integer, "all" or "diffs"
    #[serde(default)]
    pub version: Option<Value>,
}

/// Every configured resource bound to one shared in-memory store
pub struct Replayer {
    collections: BTreeMap<String, VersionedCollection<InMemoryStore>>,
    metrics: Arc<VersioningMetrics>,
}

impl Replayer {
    pub fn new(registry: &ResourceRegistry) -> CliResult<Self> {
        let store = Arc::new(InMemoryStore::with_id_field(
            registry.settings().meta.id_field.clone(),
        ));
        let metrics = Arc::new(VersioningMetrics::new());

        let mut collections = BTreeMap::new();
        for config in registry.iter() {
            let collection = VersionedCollection::new(
                Arc::clone(&store),
                Arc::clone(config),
                Arc::clone(&metrics),
            )?;
            collections.insert(config.name().to_string(), collection);
        }

        Ok(Self {
            collections,
            metrics,
        })
    }

    pub fn metrics(&self) -> &VersioningMetrics {
        &self.metrics
    }

    /// Run one operation, returning the response payload
    pub fn execute(&self, request: ReplayRequest) -> VersioningResult<Value> {
        let ReplayRequest {
            op,
            resource,
            id,
            data,
            if_match,
            if_none_match,
            version,
        } = request;

        let collection = self.collections.get(&resource).ok_or_else(|| {
            VersioningError::bad_request(format!("unknown resource {:?}", resource))
        })?;
        let if_match = if_match.as_deref();

        let require_id =
            |id: Option<String>| id.ok_or_else(|| VersioningError::bad_request("id is required"));

        match op {
            OpKind::Create => Ok(write_payload(collection.create(data.unwrap_or_default())?)),
            OpKind::Replace => {
                let id = require_id(id)?;
                let out = collection.replace(&id, data.unwrap_or_default(), if_match)?;
                Ok(write_payload(out))
            }
            OpKind::Patch => {
                let id = require_id(id)?;
                let out = collection.patch(&id, data.unwrap_or_default(), if_match)?;
                Ok(write_payload(out))
            }
            OpKind::Delete => {
                let out = collection.delete(&require_id(id)?, if_match)?;
                Ok(json!({
                    "id": out.id,
                    "version": out.version,
                    "purged": out.purged,
                }))
            }
            OpKind::Read => {
                let id = require_id(id)?;
                let selector = VersionSelector::parse(selector_text(version)?.as_deref())?;
                let out = collection.read(&id, selector, if_none_match.as_deref())?;
                Ok(read_payload(out))
            }
        }
    }

    /// Run every operation in `input`, returning how many lines were read.
    ///
    /// Failed operations are reported inline and do not stop the replay.
    pub fn run<R: BufRead, W: Write>(&self, input: R, out: &mut W) -> CliResult<usize> {
        let mut count = 0;
        for line in read_lines(input) {
            let (number, line) = line?;
            count += 1;

            let request: ReplayRequest = match serde_json::from_str(&line) {
                Ok(request) => request,
                Err(e) => {
                    write_error(out, "INVALID_REQUEST", &format!("line {}: {}", number, e))?;
                    continue;
                }
            };

            match self.execute(request) {
                Ok(data) => write_response(out, data)?,
                Err(err) => write_error(out, err.code(), &err.to_string())?,
            }
        }
        Ok(count)
    }
}

fn selector_text(version: Option<Value>) -> VersioningResult<Option<String>> {
    match version {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(VersioningError::bad_request(format!(
            "version must be an integer or string, got {}",
            other
        ))),
    }
}

fn write_payload(out: WriteOutcome) -> Value {
    json!({
        "document": out.document,
        "etag": out.fingerprint,
        "version": out.version,
    })
}

fn read_payload(out: ReadOutcome) -> Value {
    match out {
        ReadOutcome::Document {
            document,
            fingerprint,
        } => json!({ "document": document, "etag": fingerprint }),
        ReadOutcome::History(docs) => json!({ "versions": docs }),
        ReadOutcome::Diffs(docs) => json!({ "diffs": docs }),
        ReadOutcome::NotModified { fingerprint } => {
            json!({ "not_modified": true, "etag": fingerprint })
        }
    }
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let level = Severity::parse(&cli.log_level).ok_or_else(|| {
        CliError::invalid_argument(format!("unknown log level {:?}", cli.log_level))
    })?;
    Logger::set_min_severity(level);
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cmd {
        Command::Check { config } => check(&config, &mut out),
        Command::Replay { config, script } => match script {
            Some(path) => {
                let file = File::open(&path).map_err(|e| {
                    CliError::io_error(format!("{}: {}", path.display(), e))
                })?;
                replay(&config, BufReader::new(file), &mut out)
            }
            None => replay(&config, io::stdin().lock(), &mut out),
        },
    }
}

/// Validate a config file and print the derived configuration
pub fn check<W: Write>(config_path: &Path, out: &mut W) -> CliResult<()> {
    let registry = ConfigLoader::load(config_path)?;
    let resources: Vec<Value> = registry.iter().map(|config| config.describe()).collect();
    write_response(out, json!({ "resources": resources }))
}

/// Replay operations from `input` against a fresh in-memory store
pub fn replay<R: BufRead, W: Write>(config_path: &Path, input: R, out: &mut W) -> CliResult<()> {
    let registry = ConfigLoader::load(config_path)?;
    let replayer = Replayer::new(&registry)?;
    let count = replayer.run(input, out)?;

    let count = count.to_string();
    let metrics = replayer.metrics().to_json().to_string();
    log_event_with_fields(
        Event::ReplayCompleted,
        &[("operations", count.as_str()), ("metrics", metrics.as_str())],
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn create_config(temp_dir: &TempDir) -> std::path::PathBuf {
        let config_path = temp_dir.path().join("versadoc.json");
        let config = json!({
            "resources": [
                {
                    "name": "people",
                    "versioning": true,
                    "fields": [{"name": "b", "versioned": false}]
                },
                {"name": "tags"}
            ]
        });
        fs::write(&config_path, config.to_string()).unwrap();
        config_path
    }

    fn run_script(config_path: &Path, lines: &[Value]) -> Vec<Value> {
        let script: String = lines.iter().map(|l| format!("{}\n", l)).collect();
        let mut out = Vec::new();
        replay(config_path, Cursor::new(script), &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_check_prints_resources() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir);

        let mut out = Vec::new();
        check(&config_path, &mut out).unwrap();
        let response: Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(response["status"], "ok");
        let resources = response["data"]["resources"].as_array().unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0]["resource"], "people");
        assert_eq!(resources[0]["shadow_collection"], "people_versions");
        assert_eq!(resources[0]["unversioned_fields"], json!(["b"]));
    }

    #[test]
    fn test_check_rejects_bad_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("versadoc.json");
        fs::write(&config_path, r#"{"resources": [{"name": ""}]}"#).unwrap();

        let err = check(&config_path, &mut Vec::new()).unwrap_err();
        assert_eq!(err.code(), "CONFIG_EMPTY_RESOURCE_NAME");
    }

    #[test]
    fn test_replay_gates_writes_and_validates_selectors() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir);

        let responses = run_script(
            &config_path,
            &[
                json!({"op": "create", "resource": "people", "data": {"_id": "p1", "a": "x", "b": 1}}),
                json!({"op": "patch", "resource": "people", "id": "p1", "data": {"a": "y"}}),
                json!({"op": "patch", "resource": "people", "id": "p1", "data": {"a": "y"}, "if_match": "stale"}),
                json!({"op": "read", "resource": "people", "id": "p1", "version": 1}),
                json!({"op": "read", "resource": "people", "id": "p1", "version": 0}),
                json!({"op": "read", "resource": "people", "id": "p1", "version": -1}),
                json!({"op": "read", "resource": "people", "id": "p2"}),
            ],
        );

        assert_eq!(responses[0]["status"], "ok");
        assert_eq!(responses[0]["data"]["version"], 1);
        assert_eq!(responses[1]["code"], "PRECONDITION_REQUIRED");
        assert_eq!(responses[2]["code"], "PRECONDITION_FAILED");
        assert_eq!(responses[3]["data"]["document"]["a"], "x");
        assert_eq!(responses[4]["code"], "BAD_REQUEST");
        assert_eq!(responses[5]["code"], "BAD_REQUEST");
        assert_eq!(responses[6]["code"], "DOCUMENT_NOT_FOUND");
    }

    #[test]
    fn test_replay_reports_bad_lines_and_continues() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir);

        let mut out = Vec::new();
        let script = "not json\n{\"op\": \"read\", \"resource\": \"nope\", \"id\": \"x\"}\n{\"op\": \"create\", \"resource\": \"tags\", \"data\": {}}\n";
        replay(&config_path, Cursor::new(script), &mut out).unwrap();

        let responses: Vec<Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["code"], "INVALID_REQUEST");
        assert_eq!(responses[1]["code"], "BAD_REQUEST");
        assert_eq!(responses[2]["status"], "ok");
        assert!(responses[2]["data"]["version"].is_null());
    }

    #[test]
    fn test_replayer_history_round_trip() {
        let registry = ConfigLoader::from_json(
            r#"{"settings": {"enforce_if_match": false},
                "resources": [{"name": "people", "versioning": true,
                               "fields": [{"name": "b", "versioned": false}]}]}"#,
        )
        .unwrap();
        let replayer = Replayer::new(&registry).unwrap();

        let request = |value: Value| -> ReplayRequest { serde_json::from_value(value).unwrap() };

        replayer
            .execute(request(json!({"op": "create", "resource": "people", "data": {"_id": "p1", "a": "x", "b": 1}})))
            .unwrap();
        replayer
            .execute(request(json!({"op": "replace", "resource": "people", "id": "p1", "data": {"a": "y", "b": 2}})))
            .unwrap();

        let v1 = replayer
            .execute(request(json!({"op": "read", "resource": "people", "id": "p1", "version": 1})))
            .unwrap();
        assert_eq!(v1["document"]["a"], "x");
        assert_eq!(v1["document"]["b"], 2);
        assert_eq!(v1["document"]["_latest_version"], 2);

        let err = replayer
            .execute(request(json!({"op": "read", "resource": "people", "id": "p1", "version": 99})))
            .unwrap_err();
        assert_eq!(err.code(), "VERSION_NOT_FOUND");

        let diffs = replayer
            .execute(request(json!({"op": "read", "resource": "people", "id": "p1", "version": "diffs"})))
            .unwrap();
        assert_eq!(diffs["diffs"].as_array().unwrap().len(), 2);
        assert_eq!(replayer.metrics().snapshot().versions_committed, 2);
    }
}
