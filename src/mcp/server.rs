use super::jsonrpc::{Request, Response, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR};
use crate::discovery::{DiscoveryPipeline, Report, DEFAULT_MAX_RESULTS};
use crate::util::strip_control_chars;
use serde_json::{json, Value};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

pub const TOOL_NAME: &str = "discover_podcasts";
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Line-delimited JSON-RPC server exposing the discovery tool.
pub struct ToolServer {
    pipeline: DiscoveryPipeline,
    shutdown: CancellationToken,
}

impl ToolServer {
    /// `shutdown` stops the read loop and cancels any discovery in progress.
    pub fn new(pipeline: DiscoveryPipeline, shutdown: CancellationToken) -> Self {
        Self { pipeline, shutdown }
    }

    /// Reads one request per line until EOF or shutdown, writing one response
    /// line per request. Notifications are handled silently.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        loop {
            let line = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, stopping tool server");
                    break;
                }
                line = lines.next_line() => line?,
            };
            let Some(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(&line).await {
                let mut out = serde_json::to_vec(&response)?;
                out.push(b'\n');
                writer.write_all(&out).await?;
                writer.flush().await?;
            }
        }
        Ok(())
    }

    /// Handles one raw request line. `None` for notifications.
    pub async fn handle_line(&self, line: &str) -> Option<Response> {
        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Unparsable request");
                return Some(Response::error(
                    None,
                    PARSE_ERROR,
                    "Parse error",
                    Some(Value::String(e.to_string())),
                ));
            }
        };

        tracing::debug!(method = %request.method, "Request");
        if request.is_notification() {
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => handle_initialize(request),
            "ping" => Response::success(request.id, json!({})),
            "tools/list" => handle_tools_list(request),
            "tools/call" => self.handle_tools_call(request).await,
            _ => Response::error(request.id, METHOD_NOT_FOUND, "Method not found", None),
        };
        Some(response)
    }

    async fn handle_tools_call(&self, request: Request) -> Response {
        let Some(params) = request.params else {
            return invalid_params(request.id, "Missing params");
        };
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return invalid_params(request.id, "Missing tool name");
        };
        if name != TOOL_NAME {
            return Response::error(request.id, METHOD_NOT_FOUND, "Tool not found", None);
        }

        let empty = json!({});
        let arguments = params.get("arguments").unwrap_or(&empty);
        let (topic, max_results) = match parse_arguments(arguments) {
            Ok(args) => args,
            Err(reason) => return invalid_params(request.id, reason),
        };

        tracing::info!(topic = %topic, max_results, "Discovering podcasts");
        let report = self
            .pipeline
            .discover(&topic, max_results, None, &self.shutdown)
            .await
            .unwrap_or_else(Report::error);

        Response::success(
            request.id,
            json!({ "content": [{ "type": "text", "text": report.to_string() }] }),
        )
    }
}

fn handle_initialize(request: Request) -> Response {
    let protocol_version = request
        .params
        .as_ref()
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str)
        .unwrap_or(PROTOCOL_VERSION)
        .to_owned();

    Response::success(
        request.id,
        json!({
            "protocolVersion": protocol_version,
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "podcrawler", "version": env!("CARGO_PKG_VERSION") }
        }),
    )
}

fn handle_tools_list(request: Request) -> Response {
    let tools = vec![json!({
        "name": TOOL_NAME,
        "description": "Discover podcasts on a topic. Returns podcasts with their most relevant episodes and audio URLs.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "The topic to search for (e.g. \"technology\", \"history\")"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of episodes to return",
                    "default": DEFAULT_MAX_RESULTS
                }
            },
            "required": ["topic"]
        }
    })];
    Response::success(request.id, json!({ "tools": tools }))
}

/// Extracts `(topic, max_results)`. Negative limits are treated as zero.
fn parse_arguments(arguments: &Value) -> Result<(String, usize), &'static str> {
    let topic = arguments
        .get("topic")
        .and_then(Value::as_str)
        .ok_or("Missing or non-string 'topic'")?;

    let max_results = match arguments.get("max_results") {
        None | Some(Value::Null) => DEFAULT_MAX_RESULTS,
        Some(value) => {
            if let Some(n) = value.as_u64() {
                usize::try_from(n).unwrap_or(usize::MAX)
            } else if value.as_i64().is_some() {
                0
            } else {
                return Err("'max_results' must be an integer");
            }
        }
    };

    Ok((strip_control_chars(topic).into_owned(), max_results))
}

fn invalid_params(id: Option<Value>, reason: &str) -> Response {
    Response::error(
        id,
        INVALID_PARAMS,
        "Invalid params",
        Some(Value::String(reason.to_string())),
    )
}
