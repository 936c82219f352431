//! A single-coordinator MapReduce job engine: a coordinator assigns
//! file-scoped map tasks and bucket-scoped reduce tasks to crash-prone
//! workers over gRPC, reassigning any task whose deadline lapses.
//!
//! ```no_run
//! # async fn demo() -> Result<(), mapreduce::Error> {
//! use std::path::PathBuf;
//!
//! let (registry, server) = mapreduce::create_server(vec![PathBuf::from("a.txt")], 2);
//! tokio::spawn(async move {
//!     tonic::transport::Server::builder()
//!         .add_service(server)
//!         .serve("127.0.0.1:7841".parse().unwrap())
//!         .await
//!         .unwrap();
//! });
//!
//! mapreduce::worker::run(
//!     "127.0.0.1:7841",
//!     PathBuf::from("."),
//!     |_file, contents| contents.split_whitespace().map(|w| (w.to_string(), "1".to_string())).collect(),
//!     |_key, values| values.len().to_string(),
//! ).await?;
//!
//! assert!(registry.done());
//! # Ok(())
//! # }
//! ```

mod error;
pub mod intermediate;
pub mod service;
mod task;
pub mod worker;

pub use error::Error;
pub use service::create_server;
pub use task::{Assignment, Task, TaskKind, TaskRegistry, TaskStatus, DEFAULT_TASK_TIMEOUT};
pub use worker::{MapFn, ReduceFn};
