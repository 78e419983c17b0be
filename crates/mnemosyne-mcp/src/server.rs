use std::io::{self, BufRead, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mnemosyne_storage::{MnemosyneStore, DEFAULT_BUSY_TIMEOUT};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{ServerConfig, DEFAULT_MAX_FRAME_BYTES};
use crate::error::StartupError;
use crate::protocol::{
    JsonRpcRequest, JsonRpcResponse, ToolsCallParams, INTERNAL_ERROR, INVALID_PARAMS,
    INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::router::ToolRouter;
use crate::tools::build_router;

const DEFAULT_MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "mnemosyne";

pub struct McpServer {
    router: ToolRouter<MnemosyneStore>,
    max_frame_bytes: usize,
}

impl McpServer {
    pub fn new(router: ToolRouter<MnemosyneStore>) -> Self {
        Self {
            router,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    /// Caps the body size accepted from a `Content-Length` frame.
    #[must_use]
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    pub fn with_db_path(db_path: impl AsRef<Path>) -> Result<Self, StartupError> {
        Self::open(db_path.as_ref(), DEFAULT_BUSY_TIMEOUT)
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, StartupError> {
        Ok(Self::open(&config.db_path, config.busy_timeout)?
            .with_max_frame_bytes(config.max_frame_bytes))
    }

    fn open(db_path: &Path, busy_timeout: Duration) -> Result<Self, StartupError> {
        let store = MnemosyneStore::open_with_busy_timeout(db_path, busy_timeout).map_err(
            |source| StartupError::Store {
                path: db_path.to_path_buf(),
                source,
            },
        )?;
        info!(db = %db_path.display(), "store opened");
        let router = build_router(Arc::new(store))?;
        Ok(Self::new(router))
    }

    pub fn router(&self) -> &ToolRouter<MnemosyneStore> {
        &self.router
    }

    /// Answers one JSON-RPC message. Notifications produce no response.
    pub fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                request.id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "invalid jsonrpc version",
            ));
        }

        let is_notification = request.id.is_none();
        let id = request.id.clone().unwrap_or(Value::Null);

        if is_notification && request.method.starts_with("notifications/") {
            debug!(method = %request.method, "notification received");
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => {
                let protocol_version = request
                    .params
                    .get("protocolVersion")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_MCP_PROTOCOL_VERSION);
                info!(protocol_version, "client initialized");
                JsonRpcResponse::success(
                    id,
                    json!({
                        "protocolVersion": protocol_version,
                        "serverInfo": {
                            "name": SERVER_NAME,
                            "version": env!("CARGO_PKG_VERSION")
                        },
                        "capabilities": {
                            "tools": {
                                "listChanged": false
                            }
                        }
                    }),
                )
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": self.router.list() })),
            "tools/call" => self.handle_tools_call(id, request.params),
            other => {
                warn!(method = other, "method not found");
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, "method not found")
            }
        };

        Some(response)
    }

    fn handle_tools_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let parsed: ToolsCallParams = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(err) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("invalid params: {err}"));
            }
        };

        let envelope = self.router.dispatch(&parsed.name, parsed.arguments);
        match serde_json::to_value(envelope) {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => JsonRpcResponse::error(
                id,
                INTERNAL_ERROR,
                format!("failed to encode tool result: {err}"),
            ),
        }
    }

    pub fn serve_stdio(&self) -> io::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.serve(stdin.lock(), stdout.lock())
    }

    /// Runs the request loop until `reader` reaches EOF.
    ///
    /// Each message may be a single JSON line or a `Content-Length` framed
    /// body; the response uses the framing of the request it answers.
    pub fn serve<R: BufRead, W: Write>(&self, mut reader: R, mut writer: W) -> io::Result<()> {
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }

            let trimmed = line.trim_end_matches(['\r', '\n']).trim_start();
            if trimmed.is_empty() {
                continue;
            }

            let (payload, frame) = if is_stdio_header_line(trimmed) {
                let content_length = match read_stdio_content_length(&mut reader, trimmed) {
                    Ok(v) => v,
                    Err(err) => {
                        let response = JsonRpcResponse::error(
                            Value::Null,
                            PARSE_ERROR,
                            format!("invalid stdio frame: {err}"),
                        );
                        write_response(&mut writer, &response, StdioFrame::LineDelimited)?;
                        continue;
                    }
                };

                if content_length > self.max_frame_bytes {
                    warn!(
                        content_length,
                        limit = self.max_frame_bytes,
                        "rejecting oversized stdio frame"
                    );
                    let limit = u64::try_from(content_length).unwrap_or(u64::MAX);
                    io::copy(&mut (&mut reader).take(limit), &mut io::sink())?;
                    let response = JsonRpcResponse::error(
                        Value::Null,
                        PARSE_ERROR,
                        format!(
                            "stdio frame of {content_length} bytes exceeds the {} byte limit",
                            self.max_frame_bytes
                        ),
                    );
                    write_response(&mut writer, &response, StdioFrame::ContentLength)?;
                    continue;
                }

                let mut body = vec![0_u8; content_length];
                if let Err(err) = reader.read_exact(&mut body) {
                    let response = JsonRpcResponse::error(
                        Value::Null,
                        PARSE_ERROR,
                        format!("invalid stdio frame body: {err}"),
                    );
                    write_response(&mut writer, &response, StdioFrame::ContentLength)?;
                    continue;
                }
                (body, StdioFrame::ContentLength)
            } else {
                (trimmed.as_bytes().to_vec(), StdioFrame::LineDelimited)
            };

            let request: JsonRpcRequest = match serde_json::from_slice(&payload) {
                Ok(v) => v,
                Err(err) => {
                    let response =
                        JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("parse error: {err}"));
                    write_response(&mut writer, &response, frame)?;
                    continue;
                }
            };

            if let Some(response) = self.handle_request(request) {
                write_response(&mut writer, &response, frame)?;
            }
        }

        info!("input closed, stopping request loop");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StdioFrame {
    LineDelimited,
    ContentLength,
}

fn write_response<W: Write>(
    writer: &mut W,
    response: &JsonRpcResponse,
    frame: StdioFrame,
) -> io::Result<()> {
    match frame {
        StdioFrame::LineDelimited => {
            let serialized = serde_json::to_string(response)?;
            writeln!(writer, "{serialized}")?;
        }
        StdioFrame::ContentLength => {
            let serialized = serde_json::to_vec(response)?;
            write!(writer, "Content-Length: {}\r\n\r\n", serialized.len())?;
            writer.write_all(&serialized)?;
        }
    }
    writer.flush()
}

fn is_stdio_header_line(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.starts_with("content-length:") || lower.starts_with("content-type:")
}

fn read_stdio_content_length<R: BufRead>(reader: &mut R, first_line: &str) -> io::Result<usize> {
    let mut content_length = parse_content_length(first_line);
    let mut header_line = String::new();
    loop {
        header_line.clear();
        if reader.read_line(&mut header_line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "unexpected eof while reading frame headers",
            ));
        }
        let trimmed = header_line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some(v) = parse_content_length(trimmed) {
            content_length = Some(v);
        }
    }
    content_length
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing content-length header"))
}

fn parse_content_length(line: &str) -> Option<usize> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse::<usize>().ok()
}
