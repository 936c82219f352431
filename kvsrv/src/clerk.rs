//! The KV client-side handle ("clerk"): owns `cid`/`seq` and the retry loop
//! that makes Put/Append exactly-once-effect over a lossy channel.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tonic::transport::{Channel, Endpoint};

use crate::service::kv::kv_server_client::KvServerClient;
use crate::service::kv::{GetRequest, PutAppendRequest};
use crate::Error;

/// How long to wait between retransmission attempts after a transport
/// failure. The client contract is "retry forever with the same payload" —
/// no exponential backoff, so a fixed interval is used rather than the
/// unrelated optimistic-concurrency backoff shape write-conflict retries
/// elsewhere in this workspace use.
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// The KV client-side handle bound to one randomly minted `cid`.
///
/// `Clerk` is safe to share across tasks, though the usual pattern is one
/// caller issuing requests sequentially per clerk.
pub struct Clerk {
    client: tokio::sync::Mutex<KvServerClient<Channel>>,
    cid: i64,
    seq: AtomicI64,
}

impl Clerk {
    /// Connects to a kvsrv server and mints a fresh, process-unique `cid`.
    pub async fn connect(addr: impl AsRef<str>) -> Result<Self, Error> {
        let endpoint = Endpoint::from_shared(format!("http://{}", addr.as_ref()))?;
        let channel = endpoint.connect().await?;
        Ok(Self::with_channel(channel))
    }

    fn with_channel(channel: Channel) -> Self {
        Self {
            client: tokio::sync::Mutex::new(KvServerClient::new(channel)),
            // Non-negative 62-bit id, matching the original lab's
            // `nrand()` (`crypto/rand` bounded to `1 << 62`).
            cid: (rand::random::<i64>() & i64::MAX) % (1i64 << 62),
            seq: AtomicI64::new(0),
        }
    }

    /// Fetches the current value for `key`, or empty if unset.
    ///
    /// Gets carry no `(cid, seq)`: a Get is idempotent, so a retransmitted
    /// Get simply re-reads present state and cannot be confused with a
    /// later write in this unary request/reply transport.
    pub async fn get(&self, key: &[u8]) -> Vec<u8> {
        let request = GetRequest { key: key.to_vec() };

        loop {
            let mut client = self.client.lock().await;
            let result = client.get(request.clone()).await;
            drop(client);

            match result {
                Ok(response) => return response.into_inner().value,
                Err(status) => {
                    tracing::debug!(%status, "Get failed, retrying");
                    tokio::time::sleep(RETRY_INTERVAL).await;
                }
            }
        }
    }

    /// Unconditionally sets `key` to `value`; returns the value written.
    pub async fn put(&self, key: &[u8], value: &[u8]) -> Vec<u8> {
        self.put_append(key, value, false).await
    }

    /// Appends `value` to `key`'s current value; returns the value that
    /// was present *before* the append.
    pub async fn append(&self, key: &[u8], value: &[u8]) -> Vec<u8> {
        self.put_append(key, value, true).await
    }

    async fn put_append(&self, key: &[u8], value: &[u8], is_append: bool) -> Vec<u8> {
        let seq = self.seq.load(Ordering::SeqCst);
        let request = PutAppendRequest {
            key: key.to_vec(),
            value: value.to_vec(),
            cid: self.cid,
            seq,
        };

        loop {
            let mut client = self.client.lock().await;
            let result = if is_append {
                client.append(request.clone()).await
            } else {
                client.put(request.clone()).await
            };
            drop(client);

            match result {
                Ok(response) => {
                    // The request is now acknowledged: advance seq exactly
                    // once per successfully acknowledged mutation.
                    self.seq.store(seq + 1, Ordering::SeqCst);
                    return response.into_inner().value;
                }
                Err(status) => {
                    tracing::debug!(%status, is_append, "PutAppend failed, retransmitting");
                    tokio::time::sleep(RETRY_INTERVAL).await;
                }
            }
        }
    }
}
