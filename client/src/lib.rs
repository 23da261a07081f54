//! Client core for the Abelana photo service.
//!
//! [`AbelanaClient`] signs calls with the current session token, keeps the
//! three photo streams cached locally and serves that cache whenever a
//! listing cannot be fetched.
//!
//! Callers must not run two listings of the same [`StreamKind`] at once: the
//! client does not order concurrent replace/append updates of one stream.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use api_client::{
    invoke, DeletePhotoRequest, EditPhotoRequest, FlagRequest, NewPhotoRequest, Photo,
    PhotoListRequest, PhotoListResponse, PhotoUploader, RemoteResponse, RpcMethod, RpcTransport,
    SignInRequest, SignInResponse, StatusResponse, StreamKind, UploadPhotoResponse, VoteRequest,
    VoteType,
};
use auth::{PrefsTokenStore, Session};
use cache::{PhotoCache, Prefs};
use serde::de::DeserializeOwned;
use serde::Serialize;

mod errors;

pub use errors::{classify_remote, classify_transport, ClientError, CACHE_NOTICE};

/// Result of [`AbelanaClient::list_photos`].
///
/// On failure `photos` holds whatever was cached for the stream before the
/// call, so there is always something to show.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoListing {
    pub photos: Vec<Photo>,
    pub error: Option<ClientError>,
}

impl PhotoListing {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Empty on success, otherwise the error followed by [`CACHE_NOTICE`].
    pub fn message(&self) -> String {
        match &self.error {
            Some(e) => format!("{}{}", e, CACHE_NOTICE),
            None => String::new(),
        }
    }
}

pub struct AbelanaClient {
    transport: Arc<dyn RpcTransport>,
    uploader: Arc<dyn PhotoUploader>,
    session: Session,
    cache: Mutex<PhotoCache>,
}

impl AbelanaClient {
    /// Builds a client around an existing session. The photo cache is
    /// restored from `prefs`.
    pub fn new(
        transport: Arc<dyn RpcTransport>,
        uploader: Arc<dyn PhotoUploader>,
        session: Session,
        prefs: Arc<dyn Prefs>,
    ) -> Self {
        AbelanaClient {
            transport,
            uploader,
            session,
            cache: Mutex::new(PhotoCache::load(prefs)),
        }
    }

    /// Builds a client whose session token lives in the same `prefs` as the cache.
    pub fn with_prefs(
        transport: Arc<dyn RpcTransport>,
        uploader: Arc<dyn PhotoUploader>,
        prefs: Arc<dyn Prefs>,
    ) -> Self {
        let session = Session::new(Arc::new(PrefsTokenStore::new(prefs.clone())));
        Self::new(transport, uploader, session, prefs)
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, identity_token)))]
    pub async fn sign_in(&self, identity_token: &str) -> Result<(), ClientError> {
        let request = SignInRequest { identity_token: identity_token.to_string() };
        let response: SignInResponse = self.call(RpcMethod::SignIn, &request).await?;
        self.session.set_token(&response.user_token).map_err(|e| {
            tracing::error!(error = %e, "Could not save the session token");
            ClientError::Storage(e.to_string())
        })?;
        tracing::info!("Signed in");
        Ok(())
    }

    /// Requests an upload ticket for `description`, then sends `image` to
    /// the granted URL. Both steps must succeed.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, image)))]
    pub async fn upload_photo(&self, image: Vec<u8>, description: &str) -> Result<(), ClientError> {
        if image.is_empty() {
            return Err(ClientError::InvalidInput("A photo is required."));
        }
        if description.trim().is_empty() {
            return Err(ClientError::InvalidInput("A description is required."));
        }

        let request = NewPhotoRequest { description: description.to_string() };
        let ticket: UploadPhotoResponse = self.call(RpcMethod::UploadPhoto, &request).await?;

        self.uploader
            .upload_bytes(image, &ticket.upload_url)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Photo upload failed");
                ClientError::Upload
            })?;
        tracing::info!("Photo uploaded");
        Ok(())
    }

    /// Sends `vote` as is: 1 is a thumbs up, -1 a thumbs down and anything
    /// else neutral. Toggling a vote off is up to the caller.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn vote_photo(&self, photo_id: i64, vote: i32) -> Result<(), ClientError> {
        let request = VoteRequest { photo_id, vote: VoteType::from_score(vote) };
        self.call::<_, StatusResponse>(RpcMethod::RatePhoto, &request).await?;
        Ok(())
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, description)))]
    pub async fn edit_photo(&self, photo_id: i64, description: &str) -> Result<(), ClientError> {
        let request = EditPhotoRequest { photo_id, description: description.to_string() };
        self.call::<_, StatusResponse>(RpcMethod::EditPhoto, &request).await?;
        Ok(())
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn delete_photo(&self, photo_id: i64) -> Result<(), ClientError> {
        let request = DeletePhotoRequest { photo_id };
        self.call::<_, StatusResponse>(RpcMethod::DeletePhoto, &request).await?;
        Ok(())
    }

    /// Reports a photo as inappropriate. Cached lists are left alone; the
    /// caller drops the photo from whatever it is showing.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn flag_photo(&self, photo_id: i64) -> Result<(), ClientError> {
        let request = FlagRequest { photo_id };
        self.call::<_, StatusResponse>(RpcMethod::FlagPhoto, &request).await?;
        Ok(())
    }

    /// Fetches the first page of `kind` (`next_page == false`) or the page
    /// after the cached ones, and returns the whole cached list for `kind`.
    ///
    /// A next-page request for a stream with no cursor is a fresh fetch.
    /// When the call fails the cache is left untouched and its current
    /// contents are returned with the error.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn list_photos(&self, kind: StreamKind, next_page: bool) -> PhotoListing {
        let cursor = if next_page { self.lock_cache().next_page(kind) } else { 0 };
        let append = next_page && cursor != 0;
        let request = PhotoListRequest { page_number: cursor };

        match self.call::<_, PhotoListResponse>(kind.method(), &request).await {
            Ok(response) => {
                let page: Vec<Photo> = response.photos.into_iter().map(Photo::from).collect();
                tracing::debug!(
                    stream = ?kind,
                    received = page.len(),
                    next_page = response.next_page,
                    append,
                    "Photo page received"
                );
                let mut cache = self.lock_cache();
                if append {
                    cache.append(kind, page, response.next_page);
                } else {
                    cache.replace(kind, page, response.next_page);
                }
                PhotoListing { photos: cache.photos(kind).to_vec(), error: None }
            }
            Err(error) => PhotoListing {
                photos: self.lock_cache().photos(kind).to_vec(),
                error: Some(error),
            },
        }
    }

    pub fn has_more_pages(&self, kind: StreamKind) -> bool {
        self.lock_cache().has_more_pages(kind)
    }

    /// The cached list for `kind`, without contacting the server.
    pub fn cached_photos(&self, kind: StreamKind) -> Vec<Photo> {
        self.lock_cache().photos(kind).to_vec()
    }

    /// Drops the session token. Cached photo lists are kept.
    pub fn sign_out(&self) {
        if let Err(e) = self.session.clear_token() {
            tracing::error!(error = %e, "Could not remove the stored session token");
        }
        tracing::info!("Signed out");
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_signed_in()
    }

    /// Saves the photo cache to durable storage.
    pub fn checkpoint(&self) -> Result<(), ClientError> {
        self.lock_cache()
            .backup()
            .map_err(|e| ClientError::Storage(e.to_string()))
    }

    /// Final checkpoint before the client goes away.
    pub fn shutdown(self) -> Result<(), ClientError> {
        self.checkpoint()
    }

    /// Sends `request` with the current session token and checks the
    /// response's embedded error. A 403 signs the user out.
    async fn call<Req, Resp>(&self, method: RpcMethod, request: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + RemoteResponse,
    {
        let token = self.session.current_token();
        let response: Resp = invoke(self.transport.as_ref(), method, request, token.as_deref())
            .await
            .map_err(|e| classify_transport(method, &e))?;

        let remote = response.remote_error();
        if remote.is_error() {
            let error = classify_remote(method, remote);
            if error.forces_sign_out() {
                self.sign_out();
            }
            return Err(error);
        }
        Ok(response)
    }

    fn lock_cache(&self) -> MutexGuard<'_, PhotoCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
