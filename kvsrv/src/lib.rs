//! A single-server, linearizable key/value store over a lossy unary RPC
//! channel.
//!
//! `kvsrv` provides `Get`/`Put`/`Append` with exactly-once mutation effect:
//! a [`Clerk`] retries indefinitely on transport failure, and the server
//! dedupes retransmitted `(cid, seq)` pairs against a per-client reply
//! cache so a retried `Append` always returns the same "old value" it would
//! have returned on first receipt.
//!
//! # Example
//!
//! ```no_run
//! use kvsrv::Clerk;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let clerk = Clerk::connect("127.0.0.1:7840").await?;
//!
//!     clerk.put(b"x", b"hello").await;
//!     assert_eq!(clerk.get(b"x").await, b"hello");
//!
//!     let old = clerk.append(b"x", b" world").await;
//!     assert_eq!(old, b"hello");
//!
//!     Ok(())
//! }
//! ```

mod clerk;
mod error;
pub mod service;
mod state;

pub use clerk::Clerk;
pub use error::Error;
pub use service::create_server;
pub use state::KvState;
