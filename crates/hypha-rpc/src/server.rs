// crates/hypha-rpc/src/server.rs
//
// RPC server setup: HyphaRpcServer and RpcConfig.
//
// Uses a JSON-RPC-over-HTTP approach on top of tonic's transport. A single
// service accepts JSON-encoded requests with a method field, dispatches to
// the appropriate handler, and returns JSON-encoded responses. No proto
// codegen is involved.

use std::time::Instant;

use http::header::{HeaderValue, CONTENT_TYPE};
use http_body::Body as HttpBody;
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use tonic::transport::Server;
use tonic::Status;

use crate::handle::{system_clock, Clock, EngineHandle};
use crate::handlers;
use crate::middleware;

// ---------------------------------------------------------------------------
// RpcConfig
// ---------------------------------------------------------------------------

/// Configuration for the RPC server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Host to bind to (e.g., "127.0.0.1" or "0.0.0.0").
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 50061,
        }
    }
}

// ---------------------------------------------------------------------------
// JSON-RPC Envelope
// ---------------------------------------------------------------------------

/// A JSON-RPC-style request envelope.
/// The client sends a method name and a JSON params payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// The RPC method to invoke (e.g., "node/register", "report/vote").
    pub method: String,
    /// JSON-encoded parameters for the method. May be omitted for methods
    /// without parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl JsonRpcRequest {
    /// Build a request envelope.
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC-style response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Whether the request succeeded.
    pub success: bool,
    /// The result data (if success).
    pub result: Option<serde_json::Value>,
    /// Error message (if not success), formatted as `kind: message`.
    pub error: Option<String>,
}

impl JsonRpcResponse {
    fn failure(error: String) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// HyphaRpcServer
// ---------------------------------------------------------------------------

/// The RPC server for the incentive engine.
///
/// Holds the shared engine handle and the clock used to timestamp every
/// mutating call.
#[derive(Clone)]
pub struct HyphaRpcServer {
    config: RpcConfig,
    handle: EngineHandle,
    clock: Clock,
}

impl std::fmt::Debug for HyphaRpcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyphaRpcServer")
            .field("config", &self.config)
            .field("handle", &self.handle)
            .finish()
    }
}

impl HyphaRpcServer {
    /// Create a server over the given engine handle, using the system clock.
    pub fn new(config: RpcConfig, handle: EngineHandle) -> Self {
        Self {
            config,
            handle,
            clock: system_clock(),
        }
    }

    /// Replace the clock (used by tests to control time).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// The shared engine handle.
    pub fn handle(&self) -> &EngineHandle {
        &self.handle
    }

    /// Start the RPC server and listen for requests.
    ///
    /// This binds to the configured address and serves requests until
    /// the process is terminated.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = format!("{}:{}", self.config.host, self.config.port).parse()?;

        tracing::info!("Hypha RPC server starting on {}", addr);

        Server::builder()
            .accept_http1(true)
            .add_service(tonic::service::interceptor::InterceptedService::new(
                HyphaJsonRpcService::new(self.clone()),
                middleware::logging_interceptor,
            ))
            .serve(addr)
            .await?;

        Ok(())
    }

    /// Dispatch a JSON-RPC request to the appropriate handler based on the method name.
    pub async fn dispatch(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let started = Instant::now();
        let now = (self.clock)();
        let handle = &self.handle;
        let params = request.params;

        let result = match request.method.as_str() {
            // Nodes
            "node/register" => {
                dispatch_handler(params, |r| handlers::nodes::handle_register_node(handle, r, now))
                    .await
            }
            "node/claim_rewards" => {
                dispatch_handler(params, |r| handlers::nodes::handle_claim_rewards(handle, r)).await
            }
            "node/initiate_exit" => {
                dispatch_handler(params, |r| handlers::nodes::handle_initiate_exit(handle, r, now))
                    .await
            }
            "node/complete_exit" => {
                dispatch_handler(params, |r| handlers::nodes::handle_complete_exit(handle, r, now))
                    .await
            }
            "node/get" => {
                dispatch_handler(params, |r| handlers::nodes::handle_get_node(handle, r)).await
            }
            "node/list" => {
                dispatch_handler(params, |r| handlers::nodes::handle_list_nodes(handle, r)).await
            }
            "node/best_for_region" => {
                dispatch_handler(params, |r| handlers::nodes::handle_best_nodes(handle, r)).await
            }

            // Oracle
            "oracle/submit_metrics" => {
                dispatch_handler(params, |r| {
                    handlers::oracle::handle_submit_metrics(handle, r, now)
                })
                .await
            }

            // Rewards
            "rewards/distribute" => {
                dispatch_handler(params, |r| handlers::rewards::handle_distribute(handle, r, now))
                    .await
            }
            "rewards/estimate" => {
                dispatch_handler(params, |r| handlers::rewards::handle_estimate(handle, r)).await
            }
            "rewards/fund_pool" => {
                dispatch_handler(params, |r| handlers::rewards::handle_fund_pool(handle, r)).await
            }
            "rewards/epoch_status" => {
                dispatch_handler(params, |r| handlers::rewards::handle_epoch_status(handle, r))
                    .await
            }

            // Reports
            "report/submit" => {
                dispatch_handler(params, |r| {
                    handlers::reports::handle_submit_report(handle, r, now)
                })
                .await
            }
            "report/vote" => {
                dispatch_handler(params, |r| handlers::reports::handle_vote(handle, r, now)).await
            }
            "report/check_expired" => {
                dispatch_handler(params, |r| {
                    handlers::reports::handle_check_expired(handle, r, now)
                })
                .await
            }
            "report/claim_payout" => {
                dispatch_handler(params, |r| handlers::reports::handle_claim_payout(handle, r))
                    .await
            }
            "report/get" => {
                dispatch_handler(params, |r| handlers::reports::handle_get_report(handle, r)).await
            }
            "report/list" => {
                dispatch_handler(params, |r| handlers::reports::handle_list_reports(handle, r))
                    .await
            }

            // Admin
            "admin/config" => {
                dispatch_handler(params, |r| handlers::admin::handle_get_config(handle, r)).await
            }
            "admin/config/update" => {
                dispatch_handler(params, |r| handlers::admin::handle_update_config(handle, r))
                    .await
            }
            "admin/check_invariants" => {
                dispatch_handler(params, |r| {
                    handlers::admin::handle_check_invariants(handle, r)
                })
                .await
            }

            _ => Err(format!("Unknown method: {}", request.method)),
        };

        tracing::debug!(
            method = %request.method,
            success = result.is_ok(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "RPC call dispatched"
        );

        match result {
            Ok(value) => JsonRpcResponse {
                success: true,
                result: Some(value),
                error: None,
            },
            Err(err) => JsonRpcResponse::failure(err),
        }
    }
}

/// Generic dispatch helper: deserialize params into a request type,
/// call the handler, and serialize the result to JSON.
///
/// Missing (`null`) params are treated as an empty object.
async fn dispatch_handler<Req, Resp, F, Fut>(
    params: serde_json::Value,
    handler: F,
) -> Result<serde_json::Value, String>
where
    Req: serde::de::DeserializeOwned,
    Resp: serde::Serialize,
    F: FnOnce(Req) -> Fut,
    Fut: std::future::Future<Output = Result<Resp, String>>,
{
    let params = if params.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        params
    };
    let request: Req = serde_json::from_value(params)
        .map_err(|e| format!("Failed to deserialize request: {}", e))?;
    let response = handler(request).await?;
    serde_json::to_value(response).map_err(|e| format!("Failed to serialize response: {}", e))
}

// ---------------------------------------------------------------------------
// Tonic Service Wiring
// ---------------------------------------------------------------------------
// A single service with raw JSON bodies in both directions.

/// The tonic service wrapper. Accepts bytes, deserializes them as a
/// JSON-RPC request, and dispatches.
#[derive(Clone)]
pub struct HyphaJsonRpcService {
    inner: HyphaRpcServer,
}

impl std::fmt::Debug for HyphaJsonRpcService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyphaJsonRpcService").finish()
    }
}

impl HyphaJsonRpcService {
    fn new(inner: HyphaRpcServer) -> Self {
        Self { inner }
    }
}

impl tonic::server::NamedService for HyphaJsonRpcService {
    const NAME: &'static str = "hypha.rpc.IncentiveService";
}

impl<B> tower_service::Service<http::Request<B>> for HyphaJsonRpcService
where
    B: HttpBody + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send,
    B::Data: Send,
{
    type Response = http::Response<tonic::body::BoxBody>;
    type Error = std::convert::Infallible;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let inner = self.inner.clone();

        Box::pin(async move {
            let body_bytes = match collect_body(req.into_body()).await {
                Ok(b) => b,
                Err(e) => {
                    tracing::error!("Failed to read request body: {}", e);
                    let resp =
                        JsonRpcResponse::failure(format!("Failed to read request body: {}", e));
                    return Ok(build_response(&resp));
                }
            };

            let rpc_request: JsonRpcRequest = match serde_json::from_slice(&body_bytes) {
                Ok(r) => r,
                Err(e) => {
                    let resp = JsonRpcResponse::failure(format!("Invalid JSON-RPC request: {}", e));
                    return Ok(build_response(&resp));
                }
            };

            let rpc_response = inner.dispatch(rpc_request).await;
            Ok(build_response(&rpc_response))
        })
    }
}

/// Collect the body of an HTTP request into bytes.
async fn collect_body<B>(body: B) -> Result<Vec<u8>, String>
where
    B: HttpBody + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    B::Data: Send,
{
    let mut collected = Vec::new();
    let mut body = std::pin::pin!(body);

    loop {
        match std::future::poll_fn(|cx| HttpBody::poll_frame(body.as_mut(), cx)).await {
            Some(Ok(frame)) => {
                if let Ok(data) = frame.into_data() {
                    use bytes::Buf;
                    collected.extend_from_slice(data.chunk());
                }
            }
            Some(Err(e)) => return Err(e.into().to_string()),
            None => break,
        }
    }

    Ok(collected)
}

/// Build an HTTP 200 response carrying the JSON envelope.
fn build_response(envelope: &JsonRpcResponse) -> http::Response<tonic::body::BoxBody> {
    let json = serde_json::to_vec(envelope).unwrap_or_default();
    let body = tonic::body::BoxBody::new(
        http_body_util::Full::new(bytes::Bytes::from(json))
            .map_err(|e| Status::internal(format!("body error: {}", e))),
    );

    let mut response = http::Response::new(body);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
