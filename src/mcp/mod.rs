//! Tool server: JSON-RPC 2.0 over stdio.
//!
//! Implements seven tools: vibegraph_get_structural_summary,
//! vibegraph_get_call_stack, vibegraph_impact_analysis,
//! vibegraph_get_dependencies, vibegraph_find_references,
//! vibegraph_search_by_signature, vibegraph_reindex_project.
//!
//! Transport: newline-delimited JSON-RPC messages. All logging goes to
//! stderr; stdout is reserved for protocol frames. Every read-only tool is
//! idempotent and side-effect-free on the store; reindex_project is the
//! only mutator.

pub mod tools;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::events::ChangeNotifier;
use crate::graph::GraphStore;
use crate::indexer::{default_db_path, Indexer};

// ── JSON-RPC types ──────────────────────────────────────────────────────

/// JSON-RPC 2.0 request.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: String,
    /// Absent for notifications (no response expected).
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    pub(crate) fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub(crate) fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// MCP tool result (content array + isError flag).
#[derive(Debug, Serialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

/// A single content block in a tool result.
#[derive(Debug, Serialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl ToolResult {
    pub(crate) fn text(msg: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent {
                content_type: "text".to_string(),
                text: msg.into(),
            }],
            is_error: false,
        }
    }

    pub(crate) fn tool_error(msg: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent {
                content_type: "text".to_string(),
                text: msg.into(),
            }],
            is_error: true,
        }
    }
}

// ── Server ──────────────────────────────────────────────────────────────

/// Tool server holding the store, driver, and notifier for one project.
pub struct McpServer {
    pub name: String,
    pub version: String,
    root: PathBuf,
    store: Arc<GraphStore>,
    indexer: Mutex<Indexer>,
}

impl McpServer {
    /// Open (or create) the project-local database and wire up the driver.
    pub fn new(root: &Path) -> Result<Self> {
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        let db_path = default_db_path(&root)?;
        let store = Arc::new(GraphStore::open(&db_path)?);
        let notifier = Arc::new(ChangeNotifier::new());
        Self::with_store(&root, store, notifier)
    }

    /// Build a server on an existing store (tests, embedded use).
    pub fn with_store(
        root: &Path,
        store: Arc<GraphStore>,
        notifier: Arc<ChangeNotifier>,
    ) -> Result<Self> {
        let indexer = Indexer::new(root, Arc::clone(&store), notifier)?;
        Ok(Self {
            name: "vibegraph".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            root: root.to_path_buf(),
            store,
            indexer: Mutex::new(indexer),
        })
    }

    pub(crate) fn store(&self) -> &GraphStore {
        &self.store
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn lock_indexer(&self) -> Result<MutexGuard<'_, Indexer>> {
        self.indexer
            .lock()
            .map_err(|e| anyhow::anyhow!("indexer lock poisoned: {e}"))
    }

    /// Run the server. Reads newline-delimited JSON-RPC from stdin, writes
    /// responses to stdout. Blocks until stdin is closed.
    pub fn run(&self) -> io::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        let mut stdout = stdout.lock();

        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(request) => request,
                Err(e) => {
                    let resp =
                        JsonRpcResponse::error(Value::Null, -32700, format!("Parse error: {e}"));
                    write_response(&mut stdout, &resp)?;
                    continue;
                }
            };

            // Notifications carry no id and get no response
            let Some(id) = request.id else {
                self.handle_notification(&request.method);
                continue;
            };

            let response = self.handle_request(&request.method, request.params.as_ref(), id);
            write_response(&mut stdout, &response)?;
        }

        Ok(())
    }

    fn handle_notification(&self, method: &str) {
        match method {
            "notifications/initialized" => {
                tracing::info!("client initialized, vibegraph tool server ready");
            }
            other => {
                tracing::debug!("unhandled notification: {other}");
            }
        }
    }

    pub fn handle_request(
        &self,
        method: &str,
        params: Option<&Value>,
        id: Value,
    ) -> JsonRpcResponse {
        match method {
            "initialize" => self.handle_initialize(id),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, params),
            "ping" => JsonRpcResponse::success(id, json!({})),
            other => JsonRpcResponse::error(id, -32601, format!("Method not found: {other}")),
        }
    }

    fn handle_initialize(&self, id: Value) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": { "listChanged": false }
                },
                "serverInfo": {
                    "name": self.name,
                    "version": self.version
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        JsonRpcResponse::success(id, json!({ "tools": tools::tool_definitions() }))
    }

    fn handle_tools_call(&self, id: Value, params: Option<&Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::error(id, -32602, "Missing params");
        };
        let Some(tool_name) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcResponse::error(id, -32602, "Missing tool name");
        };
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        let result = tools::dispatch(self, tool_name, arguments);
        match serde_json::to_value(&result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, -32603, format!("Serialize error: {e}")),
        }
    }
}

fn write_response<W: Write>(writer: &mut W, response: &JsonRpcResponse) -> io::Result<()> {
    let line = serde_json::to_string(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}
