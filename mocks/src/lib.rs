use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use api_client::{ApiClientError, PhotoRecord, PhotoUploader, RpcMethod, RpcTransport};
use async_trait::async_trait;
use httptest::{matchers::*, responders::*, Expectation, Server};
use serde::Serialize;
use serde_json::json;

/// A call seen by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: RpcMethod,
    pub request: serde_json::Value,
    pub auth_token: Option<String>,
}

/// In-process transport that replays queued replies per method and records
/// every call it receives. A method with nothing queued fails like an
/// unreachable server.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<RpcMethod, VecDeque<Result<Vec<u8>, String>>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply encoded from `body`.
    pub fn reply<T: Serialize>(&self, method: RpcMethod, body: &T) -> &Self {
        let bytes = serde_json::to_vec(body).unwrap_or_default();
        self.push(method, Ok(bytes));
        self
    }

    /// Queue a reply carrying a remote application error.
    pub fn reply_error(&self, method: RpcMethod, code: &str) -> &Self {
        self.reply(method, &json!({"error": {"code": code, "details": "scripted"}}))
    }

    /// Queue a transport failure.
    pub fn fail(&self, method: RpcMethod) -> &Self {
        self.push(method, Err("connection refused".to_string()));
        self
    }

    /// Queue raw bytes, e.g. an undecodable body.
    pub fn reply_raw(&self, method: RpcMethod, bytes: &[u8]) -> &Self {
        self.push(method, Ok(bytes.to_vec()));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_to(&self, method: RpcMethod) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.method == method).collect()
    }

    fn push(&self, method: RpcMethod, reply: Result<Vec<u8>, String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.entry(method).or_default().push_back(reply);
        }
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn call(
        &self,
        method: RpcMethod,
        request: Vec<u8>,
        auth_token: Option<&str>,
    ) -> Result<Vec<u8>, ApiClientError> {
        let request = serde_json::from_slice(&request).unwrap_or(serde_json::Value::Null);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                method,
                request,
                auth_token: auth_token.map(str::to_string),
            });
        }
        let next = self
            .replies
            .lock()
            .ok()
            .and_then(|mut r| r.get_mut(&method).and_then(VecDeque::pop_front));
        match next {
            Some(Ok(bytes)) => Ok(bytes),
            Some(Err(msg)) => Err(ApiClientError::RequestError(msg)),
            None => Err(ApiClientError::RequestError(format!(
                "no scripted reply for {}",
                method.as_str()
            ))),
        }
    }
}

/// Uploader that records uploads and succeeds unless told otherwise.
#[derive(Default)]
pub struct RecordingUploader {
    fail: bool,
    uploads: Mutex<Vec<(String, usize)>>,
}

impl RecordingUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        RecordingUploader { fail: true, uploads: Mutex::new(Vec::new()) }
    }

    /// `(url, byte count)` for every upload attempt.
    pub fn uploads(&self) -> Vec<(String, usize)> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PhotoUploader for RecordingUploader {
    async fn upload_bytes(&self, image: Vec<u8>, url: &str) -> Result<(), ApiClientError> {
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push((url.to_string(), image.len()));
        }
        if self.fail {
            return Err(ApiClientError::UploadError("storage rejected upload".into()));
        }
        Ok(())
    }
}

pub fn photo_record(id: i64) -> PhotoRecord {
    PhotoRecord {
        photo_id: id,
        user_id: format!("user{}", id),
        url: format!("https://example.com/{}.jpg", id),
        description: format!("photo {}", id),
        date: 1_420_070_400_000_000 + id,
        rating: 0,
    }
}

/// Body of a successful listing page.
pub fn photo_page(ids: &[i64], next_page: i64) -> serde_json::Value {
    let photos: Vec<PhotoRecord> = ids.iter().copied().map(photo_record).collect();
    json!({
        "nextPage": next_page,
        "photos": photos,
    })
}

/// Create an empty mock server for the RPC endpoints.
pub fn rpc_server() -> Server {
    Server::run()
}

/// Expect a `POST` to `/abelanav2.Abelana/{method}` answered with `body`.
pub fn expect_rpc(server: &Server, method: &str, body: serde_json::Value) {
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", eq(format!("/abelanav2.Abelana/{}", method))),
            request::headers(contains(("content-type", "application/json"))),
        ])
        .respond_with(json_encoded(body)),
    );
}

/// Expect a `POST` to `/abelanav2.Abelana/{method}` carrying `token` in the
/// authorization header.
pub fn expect_authorized_rpc(server: &Server, method: &str, token: &str, body: serde_json::Value) {
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", eq(format!("/abelanav2.Abelana/{}", method))),
            request::headers(contains(("authorization", eq(token.as_bytes().to_vec())))),
        ])
        .respond_with(json_encoded(body)),
    );
}

/// Expect a `PUT` of a JPEG to `path` answered with `status`.
pub fn expect_upload(server: &Server, path: &str, status: u16) {
    server.expect(
        Expectation::matching(all_of![
            request::method_path("PUT", eq(path.to_string())),
            request::headers(contains(("content-type", "image/jpeg"))),
        ])
        .respond_with(status_code(status)),
    );
}
