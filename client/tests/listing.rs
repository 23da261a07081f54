use std::sync::Arc;

use api_client::{RpcMethod, StreamKind};
use cache::{MemoryPrefs, SqlitePrefs};
use client::{AbelanaClient, ClientError};
use mocks::{photo_page, RecordingUploader, ScriptedTransport};
use tempfile::NamedTempFile;

fn client_with(transport: &Arc<ScriptedTransport>, prefs: Arc<dyn cache::Prefs>) -> AbelanaClient {
    AbelanaClient::with_prefs(transport.clone(), Arc::new(RecordingUploader::new()), prefs)
}

fn ids(photos: &[api_client::Photo]) -> Vec<i64> {
    photos.iter().map(|p| p.id).collect()
}

#[tokio::test]
async fn fresh_then_next_page_accumulates() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .reply(RpcMethod::PhotoStream, &photo_page(&[1, 2], 5))
        .reply(RpcMethod::PhotoStream, &photo_page(&[3], 0));
    let client = client_with(&transport, Arc::new(MemoryPrefs::new()));

    let first = client.list_photos(StreamKind::Feed, false).await;
    assert!(first.is_ok());
    assert_eq!(ids(&first.photos), vec![1, 2]);
    assert!(client.has_more_pages(StreamKind::Feed));

    let second = client.list_photos(StreamKind::Feed, true).await;
    assert!(second.is_ok());
    assert_eq!(ids(&second.photos), vec![1, 2, 3]);
    assert!(!client.has_more_pages(StreamKind::Feed));

    let calls = transport.calls_to(RpcMethod::PhotoStream);
    assert_eq!(calls[0].request["pageNumber"], 0);
    assert_eq!(calls[1].request["pageNumber"], 5);
}

#[tokio::test]
async fn fresh_fetch_replaces_cached_list() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .reply(RpcMethod::ListMyLikes, &photo_page(&[1, 2, 3], 9))
        .reply(RpcMethod::ListMyLikes, &photo_page(&[7], 0));
    let client = client_with(&transport, Arc::new(MemoryPrefs::new()));

    client.list_photos(StreamKind::Liked, false).await;
    let refreshed = client.list_photos(StreamKind::Liked, false).await;
    assert_eq!(ids(&refreshed.photos), vec![7]);
    assert!(!client.has_more_pages(StreamKind::Liked));
}

#[tokio::test]
async fn streams_use_their_own_methods_and_partitions() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .reply(RpcMethod::PhotoStream, &photo_page(&[1], 0))
        .reply(RpcMethod::ListMyLikes, &photo_page(&[2], 0))
        .reply(RpcMethod::ListMyPhotos, &photo_page(&[3], 4));
    let client = client_with(&transport, Arc::new(MemoryPrefs::new()));

    client.list_photos(StreamKind::Feed, false).await;
    client.list_photos(StreamKind::Liked, false).await;
    client.list_photos(StreamKind::Owned, false).await;

    assert_eq!(ids(&client.cached_photos(StreamKind::Feed)), vec![1]);
    assert_eq!(ids(&client.cached_photos(StreamKind::Liked)), vec![2]);
    assert_eq!(ids(&client.cached_photos(StreamKind::Owned)), vec![3]);
    assert!(client.has_more_pages(StreamKind::Owned));
    assert!(!client.has_more_pages(StreamKind::Feed));
}

#[tokio::test]
async fn transport_failure_serves_cache_unchanged() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .reply(RpcMethod::PhotoStream, &photo_page(&[1, 2], 5))
        .fail(RpcMethod::PhotoStream)
        .fail(RpcMethod::PhotoStream);
    let client = client_with(&transport, Arc::new(MemoryPrefs::new()));
    client.list_photos(StreamKind::Feed, false).await;

    for next_page in [true, false] {
        let listing = client.list_photos(StreamKind::Feed, next_page).await;
        assert!(!listing.is_ok());
        assert_eq!(listing.error, Some(ClientError::Connection));
        assert_eq!(ids(&listing.photos), vec![1, 2]);
        assert!(listing.message().contains("Displaying photos from cache."));
        assert!(client.has_more_pages(StreamKind::Feed));
    }
    assert_eq!(ids(&client.cached_photos(StreamKind::Feed)), vec![1, 2]);
}

#[tokio::test]
async fn remote_error_serves_cache_unchanged() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .reply(RpcMethod::ListMyLikes, &photo_page(&[4], 3))
        .reply_error(RpcMethod::ListMyLikes, "500");
    let client = client_with(&transport, Arc::new(MemoryPrefs::new()));
    client.list_photos(StreamKind::Liked, false).await;

    let listing = client.list_photos(StreamKind::Liked, true).await;
    assert_eq!(listing.error, Some(ClientError::ServerInternal));
    assert_eq!(
        listing.message(),
        "An internal server error occurred.\nDisplaying photos from cache."
    );
    assert_eq!(ids(&listing.photos), vec![4]);
    assert!(client.has_more_pages(StreamKind::Liked));
}

#[tokio::test]
async fn failure_with_empty_cache_returns_empty_list() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.fail(RpcMethod::ListMyPhotos);
    let client = client_with(&transport, Arc::new(MemoryPrefs::new()));

    let listing = client.list_photos(StreamKind::Owned, false).await;
    assert!(!listing.is_ok());
    assert!(listing.photos.is_empty());
    assert!(listing.message().contains("Displaying photos from cache."));
}

#[tokio::test]
async fn undecodable_reply_falls_back_to_cache() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.reply_raw(RpcMethod::PhotoStream, b"<html>");
    let client = client_with(&transport, Arc::new(MemoryPrefs::new()));

    let listing = client.list_photos(StreamKind::Feed, false).await;
    assert_eq!(listing.error, Some(ClientError::Connection));
    assert!(listing.photos.is_empty());
}

#[tokio::test]
async fn next_page_without_cursor_is_fresh_fetch() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .reply(RpcMethod::PhotoStream, &photo_page(&[1, 2], 0))
        .reply(RpcMethod::PhotoStream, &photo_page(&[1, 2], 0));
    let client = client_with(&transport, Arc::new(MemoryPrefs::new()));

    client.list_photos(StreamKind::Feed, false).await;
    let again = client.list_photos(StreamKind::Feed, true).await;
    assert_eq!(ids(&again.photos), vec![1, 2]);
    assert_eq!(transport.calls_to(RpcMethod::PhotoStream)[1].request["pageNumber"], 0);
}

#[tokio::test]
async fn checkpoint_survives_restart() {
    let file = NamedTempFile::new().unwrap();
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .reply(RpcMethod::PhotoStream, &photo_page(&[1, 2], 5))
        .reply(RpcMethod::ListMyPhotos, &photo_page(&[9], 0));
    {
        let prefs = Arc::new(SqlitePrefs::new(file.path()).unwrap());
        let client = client_with(&transport, prefs);
        client.list_photos(StreamKind::Feed, false).await;
        client.list_photos(StreamKind::Owned, false).await;
        client.shutdown().unwrap();
    }

    let offline = Arc::new(ScriptedTransport::new());
    offline.fail(RpcMethod::PhotoStream);
    let prefs = Arc::new(SqlitePrefs::new(file.path()).unwrap());
    let client = client_with(&offline, prefs);
    assert_eq!(ids(&client.cached_photos(StreamKind::Feed)), vec![1, 2]);
    assert_eq!(ids(&client.cached_photos(StreamKind::Owned)), vec![9]);
    assert!(client.cached_photos(StreamKind::Liked).is_empty());
    assert!(client.has_more_pages(StreamKind::Feed));
    assert!(!client.has_more_pages(StreamKind::Owned));

    let listing = client.list_photos(StreamKind::Feed, true).await;
    assert_eq!(ids(&listing.photos), vec![1, 2]);
    assert_eq!(offline.calls_to(RpcMethod::PhotoStream)[0].request["pageNumber"], 5);
}

#[tokio::test]
async fn unsaved_pages_are_lost_on_restart() {
    let file = NamedTempFile::new().unwrap();
    let transport = Arc::new(ScriptedTransport::new());
    transport.reply(RpcMethod::PhotoStream, &photo_page(&[1], 0));
    {
        let prefs = Arc::new(SqlitePrefs::new(file.path()).unwrap());
        let client = client_with(&transport, prefs);
        client.list_photos(StreamKind::Feed, false).await;
    }

    let prefs = Arc::new(SqlitePrefs::new(file.path()).unwrap());
    let client = client_with(&transport, prefs);
    assert!(client.cached_photos(StreamKind::Feed).is_empty());
}
