//! API client module for the Abelana photo service.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod storage;
mod transport;

pub use storage::{CloudStorageUploader, PhotoUploader};
pub use transport::{HttpTransport, RpcTransport, DEFAULT_INTERFACE, DEFAULT_PACKAGE};

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("Request Error: {0}")]
    RequestError(String),
    #[error("Server Error: status {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("Encode Error: {0}")]
    EncodeError(String),
    #[error("Decode Error: {0}")]
    DecodeError(String),
    #[error("Upload Error: {0}")]
    UploadError(String),
    #[error("Other Error: {0}")]
    Other(String),
}

/// A photo as shown to the user.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: i64,
    pub owner_id: String,
    pub thumbnail_url: String,
    pub description: String,
    /// Microseconds since the Unix epoch.
    pub created_at: i64,
    /// -1, 0 or +1.
    pub vote: i64,
}

impl Photo {
    pub fn created_at_utc(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_micros(self.created_at)
            .unwrap_or_else(|| DateTime::<Utc>::from(std::time::UNIX_EPOCH))
    }
}

impl From<PhotoRecord> for Photo {
    fn from(p: PhotoRecord) -> Self {
        Photo {
            id: p.photo_id,
            owner_id: p.user_id,
            thumbnail_url: p.url,
            description: p.description,
            created_at: p.date,
            vote: p.rating,
        }
    }
}

/// The three photo listings the server exposes.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Feed,
    Liked,
    Owned,
}

impl StreamKind {
    pub const ALL: [StreamKind; 3] = [StreamKind::Feed, StreamKind::Liked, StreamKind::Owned];

    pub fn method(self) -> RpcMethod {
        match self {
            StreamKind::Feed => RpcMethod::PhotoStream,
            StreamKind::Liked => RpcMethod::ListMyLikes,
            StreamKind::Owned => RpcMethod::ListMyPhotos,
        }
    }

    /// Suffix used for the persisted cache keys of this stream.
    pub fn storage_suffix(self) -> &'static str {
        match self {
            StreamKind::Feed => "Stream",
            StreamKind::Liked => "Likes",
            StreamKind::Owned => "Mine",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    SignIn,
    UploadPhoto,
    RatePhoto,
    EditPhoto,
    DeletePhoto,
    FlagPhoto,
    PhotoStream,
    ListMyLikes,
    ListMyPhotos,
}

impl RpcMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            RpcMethod::SignIn => "SignIn",
            RpcMethod::UploadPhoto => "UploadPhoto",
            RpcMethod::RatePhoto => "RatePhoto",
            RpcMethod::EditPhoto => "EditPhoto",
            RpcMethod::DeletePhoto => "DeletePhoto",
            RpcMethod::FlagPhoto => "FlagPhoto",
            RpcMethod::PhotoStream => "PhotoStream",
            RpcMethod::ListMyLikes => "ListMyLikes",
            RpcMethod::ListMyPhotos => "ListMyPhotos",
        }
    }
}

/// Application error embedded in every response. An empty code means success.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RemoteError {
    pub code: String,
    pub details: String,
}

impl RemoteError {
    pub fn is_error(&self) -> bool {
        !self.code.is_empty()
    }
}

/// Implemented by every response record so callers can check the embedded error.
pub trait RemoteResponse {
    fn remote_error(&self) -> &RemoteError;
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SignInRequest {
    pub identity_token: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SignInResponse {
    pub user_token: String,
    pub error: RemoteError,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPhotoRequest {
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadPhotoResponse {
    pub upload_url: String,
    pub error: RemoteError,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteType {
    ThumbsUp,
    ThumbsDown,
    #[default]
    Neutral,
}

impl VoteType {
    /// Maps a +1/-1 score to a vote; anything else is neutral.
    pub fn from_score(score: i32) -> Self {
        match score {
            1 => VoteType::ThumbsUp,
            -1 => VoteType::ThumbsDown,
            _ => VoteType::Neutral,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct VoteRequest {
    pub photo_id: i64,
    pub vote: VoteType,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EditPhotoRequest {
    pub photo_id: i64,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DeletePhotoRequest {
    pub photo_id: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct FlagRequest {
    pub photo_id: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusResponse {
    pub error: RemoteError,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PhotoListRequest {
    pub page_number: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PhotoRecord {
    pub photo_id: i64,
    pub user_id: String,
    pub url: String,
    pub description: String,
    pub date: i64,
    pub rating: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PhotoListResponse {
    pub next_page: i64,
    pub photos: Vec<PhotoRecord>,
    pub error: RemoteError,
}

impl RemoteResponse for SignInResponse {
    fn remote_error(&self) -> &RemoteError {
        &self.error
    }
}

impl RemoteResponse for UploadPhotoResponse {
    fn remote_error(&self) -> &RemoteError {
        &self.error
    }
}

impl RemoteResponse for StatusResponse {
    fn remote_error(&self) -> &RemoteError {
        &self.error
    }
}

impl RemoteResponse for PhotoListResponse {
    fn remote_error(&self) -> &RemoteError {
        &self.error
    }
}

/// Encodes `request`, dispatches it through `transport` and decodes the reply.
///
/// A reply that cannot be decoded is reported as a transport-level failure,
/// the same as a call that never completed.
pub async fn invoke<Req, Resp>(
    transport: &dyn RpcTransport,
    method: RpcMethod,
    request: &Req,
    auth_token: Option<&str>,
) -> Result<Resp, ApiClientError>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let body = serde_json::to_vec(request).map_err(|e| ApiClientError::EncodeError(e.to_string()))?;
    let reply = transport.call(method, body, auth_token).await?;
    serde_json::from_slice(&reply).map_err(|e| ApiClientError::DecodeError(e.to_string()))
}
