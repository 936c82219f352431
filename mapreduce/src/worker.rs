//! The worker side of the MapReduce pull loop: poll the coordinator for a
//! task, run the caller-supplied `mapf`/`reducef`, and atomically publish
//! the result.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tonic::transport::{Channel, Endpoint};

use crate::intermediate::{bucket_of, decode_records, encode_records, write_atomic};
use crate::service::mr::{
    coordinator_client::CoordinatorClient, get_task_reply::Kind, GetTaskRequest, JobFinishRequest,
};
use crate::Error;

/// Retry interval for a coordinator RPC that failed at the transport level.
/// The coordinator may be briefly unreachable; there is no exponential
/// backoff specified, so a fixed interval is used, matching the kvsrv
/// clerk's retry loop.
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// How long to sleep after a `Wait` reply before polling again.
const WAIT_INTERVAL: Duration = Duration::from_millis(200);

/// `mapf(filename, contents) -> [(key, value)]`, the same signature as the
/// lab this was distilled from.
pub type MapFn = fn(&str, &str) -> Vec<(String, String)>;

/// `reducef(key, values) -> output`, applied once per distinct key with all
/// of its values gathered and sorted by key.
pub type ReduceFn = fn(&str, &[String]) -> String;

fn intermediate_path(work_dir: &Path, task_id: &str, bucket: u32) -> PathBuf {
    work_dir.join(format!("mr-inter-{task_id}-{bucket}"))
}

fn output_path(work_dir: &Path, bucket: u32) -> PathBuf {
    work_dir.join(format!("mr-out-{bucket}"))
}

/// Mints a process-unique worker id: a non-negative 62-bit integer, the
/// same shape as [`crate::Clerk`]'s client id and `matrix_mul`'s worker id.
fn new_worker_id() -> String {
    let id: i64 = (rand::random::<i64>() & i64::MAX) % (1i64 << 62);
    format!("worker-{id}")
}

/// Runs the pull loop against the coordinator at `addr`, writing
/// intermediate and output files under `work_dir`, until the coordinator
/// reports `Exit`.
pub async fn run(addr: impl AsRef<str>, work_dir: PathBuf, mapf: MapFn, reducef: ReduceFn) -> Result<(), Error> {
    let endpoint = Endpoint::from_shared(format!("http://{}", addr.as_ref()))?;
    let channel = endpoint.connect().await?;
    let worker_id = new_worker_id();
    let mut client = CoordinatorClient::new(channel);

    loop {
        let reply = loop {
            match client
                .get_task(GetTaskRequest {
                    worker_id: worker_id.clone(),
                })
                .await
            {
                Ok(response) => break response.into_inner(),
                Err(status) => {
                    tracing::debug!(%status, "GetTask failed, retrying");
                    tokio::time::sleep(RETRY_INTERVAL).await;
                }
            }
        };

        match reply.kind {
            Some(Kind::Map(task)) => {
                match run_map(&task.task_id, &task.input_path, &work_dir, task.n_reduce, mapf) {
                    Ok(()) => finish(&mut client, &worker_id, &task.task_id).await,
                    Err(err) => {
                        tracing::warn!(task_id = %task.task_id, %err, "map task aborted");
                    }
                }
            }
            Some(Kind::Reduce(task)) => {
                match run_reduce(&task.task_id, task.bucket, &work_dir, reducef) {
                    Ok(()) => finish(&mut client, &worker_id, &task.task_id).await,
                    Err(err) => {
                        tracing::warn!(task_id = %task.task_id, %err, "reduce task aborted");
                    }
                }
            }
            Some(Kind::Wait(_)) | None => {
                tokio::time::sleep(WAIT_INTERVAL).await;
            }
            Some(Kind::Exit(_)) => return Ok(()),
        }
    }
}

async fn finish(client: &mut CoordinatorClient<Channel>, worker_id: &str, task_id: &str) {
    loop {
        let request = JobFinishRequest {
            worker_id: worker_id.to_string(),
            task_id: task_id.to_string(),
        };
        match client.job_finish(request).await {
            Ok(_) => return,
            Err(status) => {
                tracing::debug!(%status, task_id, "JobFinish failed, retrying");
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
        }
    }
}

/// Reads `input_path`, runs `mapf`, partitions the emitted records into
/// `n_reduce` buckets by key hash, and atomically publishes one
/// intermediate file per non-empty bucket.
///
/// Any I/O failure aborts the task without calling JobFinish — the
/// coordinator will time it out and reassign.
fn run_map(task_id: &str, input_path: &str, work_dir: &Path, n_reduce: u32, mapf: MapFn) -> Result<(), Error> {
    let contents = std::fs::read_to_string(input_path)?;
    let emitted = mapf(input_path, &contents);

    let mut buckets: Vec<Vec<(String, String)>> = vec![Vec::new(); n_reduce as usize];
    for (key, value) in emitted {
        if n_reduce == 0 {
            continue;
        }
        let bucket = bucket_of(&key, n_reduce) as usize;
        buckets[bucket].push((key, value));
    }

    for (bucket, records) in buckets.into_iter().enumerate() {
        let path = intermediate_path(work_dir, task_id, bucket as u32);
        write_atomic(&path, &encode_records(&records))?;
    }

    Ok(())
}

/// Gathers every intermediate file written for `bucket` across all
/// completed map tasks, groups values by key, runs `reducef` once per
/// key in sorted order, and atomically publishes `mr-out-<bucket>`.
fn run_reduce(_task_id: &str, bucket: u32, work_dir: &Path, reducef: ReduceFn) -> Result<(), Error> {
    let suffix = format!("-{bucket}");
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for entry in std::fs::read_dir(work_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with("mr-inter-") || !name.ends_with(&suffix) {
            continue;
        }

        let data = std::fs::read(entry.path())?;
        for (key, value) in decode_records(&data)? {
            grouped.entry(key).or_default().push(value);
        }
    }

    let mut output = String::new();
    for (key, values) in &grouped {
        let result = reducef(key, values);
        output.push_str(&key);
        output.push(' ');
        output.push_str(&result);
        output.push('\n');
    }

    write_atomic(&output_path(work_dir, bucket), output.as_bytes())
}
