//! gRPC service shim binding [`TaskRegistry`] to the generated `mr` proto
//! types.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tonic::{Request, Response, Status};

use crate::task::{Assignment, TaskRegistry};

pub mod mr {
    tonic::include_proto!("mr");
}

use mr::{
    coordinator_server::{Coordinator as CoordinatorRpc, CoordinatorServer},
    get_task_reply::Kind,
    Exit, GetTaskReply, GetTaskRequest, JobFinishReply, JobFinishRequest, MapTask, ReduceTask, Wait,
};

pub struct CoordinatorService {
    registry: Mutex<TaskRegistry>,
}

impl CoordinatorService {
    pub fn new(input_files: Vec<PathBuf>, n_reduce: u32) -> Self {
        Self {
            registry: Mutex::new(TaskRegistry::new(input_files, n_reduce)),
        }
    }

    pub fn with_timeout(input_files: Vec<PathBuf>, n_reduce: u32, task_timeout: Duration) -> Self {
        Self {
            registry: Mutex::new(TaskRegistry::with_timeout(input_files, n_reduce, task_timeout)),
        }
    }

    /// Polled externally by the driver binary to decide when to shut down.
    pub fn done(&self) -> bool {
        self.registry.lock().unwrap().done()
    }
}

#[tonic::async_trait]
impl CoordinatorRpc for std::sync::Arc<CoordinatorService> {
    async fn get_task(
        &self,
        request: Request<GetTaskRequest>,
    ) -> Result<Response<GetTaskReply>, Status> {
        let req = request.into_inner();
        let assignment = self
            .registry
            .lock()
            .unwrap()
            .get_task(&req.worker_id, Instant::now());

        let kind = match assignment {
            Assignment::Map { task_id, input_path, n_reduce } => Kind::Map(MapTask {
                task_id,
                input_path: input_path.to_string_lossy().into_owned(),
                n_reduce,
            }),
            Assignment::Reduce { task_id, bucket } => Kind::Reduce(ReduceTask { task_id, bucket }),
            Assignment::Wait => Kind::Wait(Wait {}),
            Assignment::Exit => Kind::Exit(Exit {}),
        };

        Ok(Response::new(GetTaskReply { kind: Some(kind) }))
    }

    async fn job_finish(
        &self,
        request: Request<JobFinishRequest>,
    ) -> Result<Response<JobFinishReply>, Status> {
        let req = request.into_inner();
        self.registry
            .lock()
            .unwrap()
            .job_finish(&req.worker_id, &req.task_id);
        Ok(Response::new(JobFinishReply {}))
    }
}

/// Builds the task registry and its tonic wrapper, returning a shared
/// handle the driver can poll with [`CoordinatorService::done`] alongside
/// the `CoordinatorServer` tonic hands to `Server::builder()`.
pub fn create_server(
    input_files: Vec<PathBuf>,
    n_reduce: u32,
) -> (std::sync::Arc<CoordinatorService>, CoordinatorServer<std::sync::Arc<CoordinatorService>>) {
    let service = std::sync::Arc::new(CoordinatorService::new(input_files, n_reduce));
    let server = CoordinatorServer::new(service.clone());
    (service, server)
}
