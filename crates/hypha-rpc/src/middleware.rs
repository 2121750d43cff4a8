// crates/hypha-rpc/src/middleware.rs
//
// Middleware for the RPC server: request logging interceptor.

use tonic::{Request, Status};

/// Logging interceptor for incoming transport requests.
///
/// Logs the request metadata at debug level; the dispatcher logs each
/// method call with its outcome separately.
pub fn logging_interceptor(req: Request<()>) -> Result<Request<()>, Status> {
    tracing::debug!(metadata = ?req.metadata(), "Incoming RPC request");
    Ok(req)
}
