//! Test doubles shared by the worker's test modules.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use offcache_client::{FetchedResponse, Transport};
use offcache_core::store::PartitionHandle;
use offcache_core::{Error, RequestDescriptor, ResponseSnapshot, StoreDb};

/// Scripted reply for one URL.
#[derive(Clone)]
enum Reply {
    Respond { status: u16, content_type: String, body: Vec<u8> },
    Fail(String),
    /// Never resolves; exercises paths that must not wait on the network.
    Hang,
}

/// A transport whose replies are scripted per URL.
///
/// URLs with no script fail with a network error, so tests notice
/// unexpected fetches.
pub(crate) struct MockTransport {
    replies: Mutex<HashMap<String, Reply>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self { replies: Mutex::new(HashMap::new()) }
    }

    pub(crate) fn respond(&self, url: &str, status: u16, content_type: &str, body: &[u8]) {
        self.replies.lock().unwrap().insert(
            url.to_string(),
            Reply::Respond { status, content_type: content_type.to_string(), body: body.to_vec() },
        );
    }

    pub(crate) fn fail(&self, url: &str, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::Fail(message.to_string()));
    }

    pub(crate) fn hang(&self, url: &str) {
        self.replies.lock().unwrap().insert(url.to_string(), Reply::Hang);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<FetchedResponse, Error> {
        let reply = self.replies.lock().unwrap().get(request.url.as_str()).cloned();

        match reply {
            Some(Reply::Respond { status, content_type, body }) => Ok(FetchedResponse {
                url: request.url.to_string(),
                status,
                content_type: Some(content_type.clone()),
                headers: vec![("content-type".to_string(), content_type)],
                body: Bytes::from(body),
                fetch_ms: 1,
            }),
            Some(Reply::Fail(message)) => Err(Error::Network(message)),
            Some(Reply::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            None => Err(Error::Network(format!("no scripted reply for {}", request.url))),
        }
    }
}

/// A stored 200 snapshot with the given body.
pub(crate) fn snapshot_with_body(url: &str, body: &[u8]) -> ResponseSnapshot {
    ResponseSnapshot::new(
        url,
        200,
        Some("text/html".to_string()),
        vec![("content-type".to_string(), "text/html".to_string())],
        body.to_vec(),
    )
}

/// Poll the store until the key holds the expected body.
///
/// Background refreshes land asynchronously; panics after ~2s so a missed
/// write fails the test instead of hanging it.
pub(crate) async fn wait_for_body(store: &StoreDb, partition: &PartitionHandle, key: &str, expected: &[u8]) {
    for _ in 0..200 {
        if let Some(snapshot) = store.get_snapshot(partition, key).await.unwrap()
            && snapshot.body == expected
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("store never observed the expected snapshot for key {key}");
}
