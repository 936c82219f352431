//! gRPC service shim binding [`KvState`] to the generated `kv` proto types.

use std::sync::Mutex;

use tonic::{Request, Response, Status};

use crate::state::KvState;

pub mod kv {
    tonic::include_proto!("kv");
}

use kv::{
    kv_server_server::{KvServer, KvServerServer},
    GetReply, GetRequest, PutAppendReply, PutAppendRequest,
};

pub struct KvServiceImpl {
    state: Mutex<KvState>,
}

impl KvServiceImpl {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(KvState::new()),
        }
    }
}

impl Default for KvServiceImpl {
    fn default() -> Self {
        Self::new()
    }
}

#[tonic::async_trait]
impl KvServer for KvServiceImpl {
    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetReply>, Status> {
        let req = request.into_inner();
        let value = self.state.lock().unwrap().get(&req.key);
        Ok(Response::new(GetReply { value }))
    }

    async fn put(
        &self,
        request: Request<PutAppendRequest>,
    ) -> Result<Response<PutAppendReply>, Status> {
        let req = request.into_inner();
        let reply = self
            .state
            .lock()
            .unwrap()
            .put(req.cid, req.seq, &req.key, &req.value);
        Ok(Response::new(PutAppendReply { value: reply }))
    }

    async fn append(
        &self,
        request: Request<PutAppendRequest>,
    ) -> Result<Response<PutAppendReply>, Status> {
        let req = request.into_inner();
        let reply = self
            .state
            .lock()
            .unwrap()
            .append(req.cid, req.seq, &req.key, &req.value);
        Ok(Response::new(PutAppendReply { value: reply }))
    }
}

pub fn create_server() -> KvServerServer<KvServiceImpl> {
    KvServerServer::new(KvServiceImpl::new())
}
