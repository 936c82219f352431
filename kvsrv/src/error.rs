//! Error types for the KV client.

use thiserror::Error;

/// Errors a single RPC attempt can fail with.
///
/// The clerk never lets these escape to its caller — `Get`/`Put`/`Append`
/// retry forever on any of them — but the type exists so a single attempt
/// is testable and so the retry loop has something concrete to match on.
#[derive(Debug, Error)]
pub enum Error {
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("gRPC status error: {0}")]
    Status(#[from] tonic::Status),
}
