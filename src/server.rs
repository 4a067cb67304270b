//! Session engine (spec §4.1, §5): the dispatch table tying lifecycle,
//! resources, tools, prompts, and sampling together over one stdio
//! connection. Grounded on the teacher's session-actor loop, generalized
//! from its `Command`/`Event` thread to a plain `&self` dispatcher: the
//! caller (`main`) spawns one task per inbound frame so a long-running tool
//! call never blocks a concurrent `$/cancelRequest` from reaching the same
//! `CancellationRegistry`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::cancellation::CancellationRegistry;
use crate::config::Config;
use crate::error::McpError;
use crate::observability::{Outcome, Recorder, RequestSpan};
use crate::outbound::OutboundQueue;
use crate::prompts::PromptRegistry;
use crate::protocol::{
    methods, CancelParams, CreateMessageResult, InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, PromptsCapability, PromptsGetParams, PromptsListResult, RequestId, ResourcesCapability,
    ResourcesListResult, ResourcesReadParams, ResourcesReadResult, ResourcesSubscribeParams,
    ResourcesUnsubscribeParams, ServerCapabilities, ServerInfo, ToolCallParams, ToolsCapability, ToolsListResult,
};
use crate::resources::uri::ResourceUri;
use crate::resources::subscriptions::SubscriptionRegistry;
use crate::resources::ResourceCatalog;
use crate::sampling::SamplingClient;
use crate::session::Session;
use crate::store::Store;
use crate::tools::{ToolContext, ToolRegistry};

pub const SERVER_NAME: &str = "library-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// One stdio connection's worth of state. Cheap to construct; owns the
/// store handle, registries, and the outbound writer handle, but not the
/// writer task itself (the caller owns that join handle).
pub struct Server {
    session: Session,
    store: Store,
    config: Arc<Config>,
    outbound: OutboundQueue,
    cancellation: CancellationRegistry,
    subscriptions: Arc<SubscriptionRegistry>,
    resources: ResourceCatalog,
    tools: ToolRegistry,
    prompts: PromptRegistry,
    recorder: Arc<dyn Recorder>,
    client_supports_sampling: AtomicBool,
}

impl Server {
    pub fn new(store: Store, config: Arc<Config>, outbound: OutboundQueue, recorder: Arc<dyn Recorder>) -> Self {
        let subscriptions = Arc::new(SubscriptionRegistry::new());
        let resources = ResourceCatalog::with_subscriptions(store.clone(), config.clone(), subscriptions.clone());
        Self {
            session: Session::new(),
            store,
            config,
            outbound,
            cancellation: CancellationRegistry::new(),
            subscriptions,
            resources,
            tools: ToolRegistry::new(),
            prompts: PromptRegistry::new(),
            recorder,
            client_supports_sampling: AtomicBool::new(false),
        }
    }

    /// Entry point for one inbound line of newline-delimited JSON. Frames
    /// with a `method` field are requests/notifications; frames without one
    /// are responses to a server-initiated `sampling/createMessage` call.
    pub async fn handle_line(&self, line: &str) {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                self.outbound.send_response(JsonRpcResponse::error(
                    None,
                    JsonRpcError::from(&McpError::Parse(e.to_string())),
                ));
                return;
            }
        };

        if value.get("method").is_some() {
            match serde_json::from_value::<JsonRpcRequest>(value) {
                Ok(req) => self.handle_request(req).await,
                Err(e) => {
                    self.outbound.send_response(JsonRpcResponse::error(
                        None,
                        JsonRpcError::from(&McpError::InvalidRequest(e.to_string())),
                    ));
                }
            }
        } else {
            self.handle_client_response(value).await;
        }
    }

    async fn handle_client_response(&self, value: Value) {
        let Some(id) = value.get("id").and_then(|v| serde_json::from_value::<RequestId>(v.clone()).ok()) else {
            return;
        };
        match value.get("result") {
            Some(result) => {
                if let Ok(result) = serde_json::from_value::<CreateMessageResult>(result.clone()) {
                    self.outbound.resolve_pending(&id, result).await;
                }
            }
            None => {
                self.outbound.forget_pending(&id).await;
            }
        }
    }

    async fn handle_request(&self, req: JsonRpcRequest) {
        let id = req.id.clone();
        let params = req.params.clone().unwrap_or(Value::Null);

        if req.is_notification() {
            self.handle_notification(&req.method, params).await;
            return;
        }

        let mut span = RequestSpan::start(self.recorder.as_ref(), operation_type(&req.method), req.method.clone());
        let result = self.dispatch(&req.method, params, id.clone()).await;
        match &result {
            Ok(_) => span.mark(Outcome::Success),
            Err(e) if e.code() == -32800 => span.mark(Outcome::Cancelled),
            Err(_) => span.mark(Outcome::Failure),
        }

        let response = match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(err) => JsonRpcResponse::error(id, JsonRpcError::from(&err)),
        };
        self.outbound.send_response(response);
    }

    async fn handle_notification(&self, method: &str, params: Value) {
        match method {
            methods::INITIALIZED => {
                if let Err(e) = self.session.mark_initialized() {
                    tracing::warn!(error = %e, "notifications/initialized received out of order");
                }
            }
            methods::CANCEL => {
                if let Ok(cancel) = serde_json::from_value::<CancelParams>(params) {
                    self.cancellation.cancel(&cancel.id);
                }
            }
            other => tracing::debug!(method = other, "ignoring unknown notification"),
        }
    }

    async fn dispatch(&self, method: &str, params: Value, id: Option<RequestId>) -> Result<Value, McpError> {
        match method {
            methods::INITIALIZE => self.handle_initialize(params),
            methods::SHUTDOWN => self.handle_shutdown(),
            methods::PING => self.handle_ping(),
            methods::RESOURCES_LIST => {
                self.session.require_ready()?;
                Ok(serde_json::to_value(ResourcesListResult {
                    resources: self.resources.list().resources,
                })
                .unwrap_or(Value::Null))
            }
            methods::RESOURCES_READ => {
                self.session.require_ready()?;
                let params: ResourcesReadParams = parse_params(params)?;
                let outcome = self.resources.read(&params.uri).await?;
                Ok(serde_json::to_value(ResourcesReadResult {
                    contents: vec![outcome.contents],
                })
                .unwrap_or(Value::Null))
            }
            methods::RESOURCES_SUBSCRIBE => {
                self.session.require_ready()?;
                let params: ResourcesSubscribeParams = parse_params(params)?;
                let (resource, _query) = ResourceUri::parse(&params.uri)?;
                let subscription_id = self.resources.subscribe(&params.uri, resource)?;
                Ok(serde_json::to_value(crate::protocol::ResourcesSubscribeResult { subscription_id }).unwrap_or(Value::Null))
            }
            methods::RESOURCES_UNSUBSCRIBE => {
                self.session.require_ready()?;
                let params: ResourcesUnsubscribeParams = parse_params(params)?;
                self.resources.unsubscribe(&params.subscription_id);
                Ok(serde_json::json!({}))
            }
            methods::TOOLS_LIST => {
                self.session.require_ready()?;
                Ok(serde_json::to_value(ToolsListResult { tools: self.tools.list() }).unwrap_or(Value::Null))
            }
            methods::TOOLS_CALL => {
                self.session.require_ready()?;
                let params: ToolCallParams = parse_params(params)?;
                self.handle_tool_call(params, id).await
            }
            methods::PROMPTS_LIST => {
                self.session.require_ready()?;
                Ok(serde_json::to_value(PromptsListResult {
                    prompts: self.prompts.list().prompts,
                })
                .unwrap_or(Value::Null))
            }
            methods::PROMPTS_GET => {
                self.session.require_ready()?;
                let params: PromptsGetParams = parse_params(params)?;
                let result = self.prompts.get(&self.store, &params.name, params.arguments).await?;
                Ok(serde_json::to_value(result).unwrap_or(Value::Null))
            }
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    fn handle_initialize(&self, params: Value) -> Result<Value, McpError> {
        let params: InitializeParams = parse_params(params)?;
        self.session.begin_initialize()?;
        self.client_supports_sampling
            .store(params.capabilities.supports_sampling(), Ordering::SeqCst);

        let result = InitializeResult {
            protocol_version: crate::protocol::SUPPORTED_PROTOCOL_VERSIONS[0].to_string(),
            capabilities: ServerCapabilities {
                resources: ResourcesCapability {
                    subscribe: true,
                    list_changed: false,
                },
                tools: ToolsCapability { list_changed: false },
                prompts: PromptsCapability { list_changed: false },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
        };
        Ok(serde_json::to_value(result).unwrap_or(Value::Null))
    }

    fn handle_shutdown(&self) -> Result<Value, McpError> {
        self.session.begin_shutdown()?;
        self.session.mark_stopped();
        Ok(serde_json::json!({}))
    }

    fn handle_ping(&self) -> Result<Value, McpError> {
        self.session.require_not_stopped()?;
        Ok(serde_json::json!({}))
    }

    async fn handle_tool_call(&self, params: ToolCallParams, id: Option<RequestId>) -> Result<Value, McpError> {
        let request_id = id.ok_or_else(|| McpError::InvalidRequest("tools/call requires an id".to_string()))?;
        let token = self.cancellation.register(request_id.clone());
        let ctx = ToolContext {
            store: self.store.clone(),
            config: self.config.clone(),
            outbound: self.outbound.clone(),
            subscriptions: self.subscriptions.clone(),
            sampling: self.sampling_client(),
            recorder: self.recorder.clone(),
            cancellation: token,
            progress_token: params.progress_token(),
        };
        let result = self.tools.call(&ctx, params).await;
        self.cancellation.unregister(&request_id);
        Ok(serde_json::to_value(result?).unwrap_or(Value::Null))
    }

    fn sampling_client(&self) -> SamplingClient {
        SamplingClient::new(
            self.outbound.clone(),
            self.client_supports_sampling.load(Ordering::SeqCst),
            self.config.sampling_timeout_seconds,
        )
    }

    pub fn is_stopped(&self) -> bool {
        self.session.state() == crate::session::SessionState::Stopped
    }
}

fn operation_type(method: &str) -> &'static str {
    match method {
        methods::INITIALIZE | methods::SHUTDOWN | methods::PING => "lifecycle",
        methods::RESOURCES_LIST | methods::RESOURCES_READ | methods::RESOURCES_SUBSCRIBE | methods::RESOURCES_UNSUBSCRIBE => {
            "resource"
        }
        methods::TOOLS_LIST | methods::TOOLS_CALL => "tool",
        methods::PROMPTS_LIST | methods::PROMPTS_GET => "prompt",
        _ => "unknown",
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, McpError> {
    serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::recorder_for;
    use serde_json::json;

    async fn test_server() -> (Server, tokio::io::ReadHalf<tokio::io::DuplexStream>) {
        let store = Store::in_memory().await.unwrap();
        let (read, write) = tokio::io::duplex(65536);
        let (outbound, _writer) = OutboundQueue::spawn(write);
        let server = Server::new(store, Arc::new(Config::default()), outbound, Arc::from(recorder_for(false)));
        (server, read)
    }

    async fn next_line(read: &mut tokio::io::ReadHalf<tokio::io::DuplexStream>) -> Value {
        use tokio::io::{AsyncBufReadExt, BufReader};
        let mut lines = BufReader::new(read).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn initialize_then_tools_list_round_trips() {
        let (server, mut read) = test_server().await;
        server
            .handle_line(
                &json!({
                    "jsonrpc": "2.0", "id": 1, "method": "initialize",
                    "params": {"protocolVersion": "2024-11-05", "capabilities": {}, "clientInfo": {"name": "t", "version": "1"}}
                })
                .to_string(),
            )
            .await;
        let init_response = next_line(&mut read).await;
        assert!(init_response.get("result").is_some());

        server
            .handle_line(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string())
            .await;

        server
            .handle_line(&json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}).to_string())
            .await;
        let tools_response = next_line(&mut read).await;
        assert_eq!(tools_response["result"]["tools"].as_array().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn request_before_initialize_is_not_initialized() {
        let (server, mut read) = test_server().await;
        server
            .handle_line(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}).to_string())
            .await;
        let response = next_line(&mut read).await;
        assert_eq!(response["error"]["code"], -32002);
    }

    #[tokio::test]
    async fn unparseable_line_yields_parse_error() {
        let (server, mut read) = test_server().await;
        server.handle_line("not json").await;
        let response = next_line(&mut read).await;
        assert_eq!(response["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn double_initialize_is_not_initialized() {
        let (server, mut read) = test_server().await;
        let init = json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {"protocolVersion": "2024-11-05", "capabilities": {}, "clientInfo": {"name": "t", "version": "1"}}
        })
        .to_string();
        server.handle_line(&init).await;
        let _ = next_line(&mut read).await;
        server.handle_line(&init).await;
        let response = next_line(&mut read).await;
        assert_eq!(response["error"]["code"], -32002);
    }
}
