use std::collections::HashMap;
use std::sync::Arc;

use api_client::{Photo, StreamKind};

use crate::{CacheError, Prefs};

pub fn list_key(kind: StreamKind) -> String {
    format!("photoLists_{}", kind.storage_suffix())
}

pub fn next_page_key(kind: StreamKind) -> String {
    format!("photoListsNextPage_{}", kind.storage_suffix())
}

/// Photo lists and next-page cursors for the three streams.
///
/// Both maps always hold an entry for every [`StreamKind`]. A cursor of 0
/// means the list has no further pages (or was never fetched).
pub struct PhotoCache {
    prefs: Arc<dyn Prefs>,
    lists: HashMap<StreamKind, Vec<Photo>>,
    next_page: HashMap<StreamKind, i64>,
}

impl PhotoCache {
    /// Restores the last checkpoint from `prefs`, or starts empty when any
    /// of the six entries is missing or unreadable.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(prefs)))]
    pub fn load(prefs: Arc<dyn Prefs>) -> Self {
        let restored = match restore(prefs.as_ref()) {
            Ok(restored) => restored,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable photo cache");
                None
            }
        };
        let (lists, next_page) = restored.unwrap_or_else(|| {
            tracing::debug!("Starting with an empty photo cache");
            (
                StreamKind::ALL.iter().map(|k| (*k, Vec::new())).collect(),
                StreamKind::ALL.iter().map(|k| (*k, 0)).collect(),
            )
        });
        PhotoCache { prefs, lists, next_page }
    }

    pub fn photos(&self, kind: StreamKind) -> &[Photo] {
        self.lists.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn next_page(&self, kind: StreamKind) -> i64 {
        self.next_page.get(&kind).copied().unwrap_or(0)
    }

    pub fn has_more_pages(&self, kind: StreamKind) -> bool {
        self.next_page(kind) != 0
    }

    /// Discards the cached list for `kind` and keeps `photos` instead.
    pub fn replace(&mut self, kind: StreamKind, photos: Vec<Photo>, next_page: i64) {
        self.lists.insert(kind, photos);
        self.next_page.insert(kind, next_page);
    }

    /// Adds a further page after the photos already cached for `kind`.
    pub fn append(&mut self, kind: StreamKind, photos: Vec<Photo>, next_page: i64) {
        self.lists.entry(kind).or_default().extend(photos);
        self.next_page.insert(kind, next_page);
    }

    /// Writes every list and cursor to the durable store in one batch.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub fn backup(&self) -> Result<(), CacheError> {
        let mut entries = Vec::with_capacity(StreamKind::ALL.len() * 2);
        for kind in StreamKind::ALL {
            let list = serde_json::to_vec(self.photos(kind))
                .map_err(|e| CacheError::SerializationError(e.to_string()))?;
            let cursor = serde_json::to_vec(&self.next_page(kind))
                .map_err(|e| CacheError::SerializationError(e.to_string()))?;
            entries.push((list_key(kind), list));
            entries.push((next_page_key(kind), cursor));
        }
        self.prefs.set_many(&entries)?;
        self.prefs.flush()?;
        tracing::info!(
            feed = self.photos(StreamKind::Feed).len(),
            liked = self.photos(StreamKind::Liked).len(),
            owned = self.photos(StreamKind::Owned).len(),
            "Photo cache saved"
        );
        Ok(())
    }
}

type Restored = (HashMap<StreamKind, Vec<Photo>>, HashMap<StreamKind, i64>);

fn restore(prefs: &dyn Prefs) -> Result<Option<Restored>, CacheError> {
    let mut lists = HashMap::new();
    let mut next_page = HashMap::new();
    for kind in StreamKind::ALL {
        let (Some(list), Some(cursor)) = (prefs.get(&list_key(kind))?, prefs.get(&next_page_key(kind))?)
        else {
            return Ok(None);
        };
        let list: Vec<Photo> = serde_json::from_slice(&list)
            .map_err(|e| CacheError::DeserializationError(e.to_string()))?;
        let cursor: i64 = serde_json::from_slice(&cursor)
            .map_err(|e| CacheError::DeserializationError(e.to_string()))?;
        lists.insert(kind, list);
        next_page.insert(kind, cursor);
    }
    Ok(Some((lists, next_page)))
}
