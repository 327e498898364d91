/*
 *  tests/client_factory.rs
 *
 *  Client factory and playback client against a local Spotify lookalike.
 *
 *  spotify-ish - now playing, on the wall
 *  (c) 2020-26 Stuart Hunter
 */

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

use common::{session, spawn_fake_spotify, PlayerMode, SpotifyServer};
use spotify_ish::events::SessionEvent;
use spotify_ish::spotify::{build_http_client, ClientError, ClientFactory, ItemKind};
use spotify_ish::store::{CredentialStore, UserSession};
use spotify_ish::sync_loop::PlaybackSource;

struct Fixture {
    _dir: TempDir,
    spotify: SpotifyServer,
    store: Arc<CredentialStore>,
    factory: ClientFactory,
}

async fn fixture(stored: Option<UserSession>) -> Fixture {
    let dir = tempdir().unwrap();
    let store = Arc::new(CredentialStore::open(dir.path().join("config.json")).unwrap());
    if let Some(session) = stored {
        store.set(session).unwrap();
    }
    let spotify = spawn_fake_spotify().await;
    let factory = ClientFactory::new(
        build_http_client().unwrap(),
        "client-id".to_string(),
        "client-secret".to_string(),
        spotify.endpoints(),
        store.clone(),
    );
    Fixture { _dir: dir, spotify, store, factory }
}

fn expired(id: &str) -> UserSession {
    UserSession { expires: Utc::now() - ChronoDuration::minutes(1), ..session(id) }
}

#[tokio::test]
async fn test_now_playing_track() {
    let f = fixture(Some(session("u1"))).await;
    let snapshot = f.factory.now_playing().await.unwrap();

    assert!(snapshot.is_playing);
    assert_eq!(snapshot.device_id.as_deref(), Some("dev-1"));
    let item = snapshot.item.unwrap();
    assert_eq!(item.id, "track-1");
    assert_eq!(item.kind, ItemKind::Track);
    assert_eq!(item.artist_names(), "Artist One, Artist Two");
    assert_eq!(item.largest_image().unwrap().url, "https://i.scdn.co/640");
    assert_eq!(f.spotify.state.token_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_nothing_playing() {
    let f = fixture(Some(session("u1"))).await;
    f.spotify.state.set_mode(PlayerMode::Nothing);
    let snapshot = f.factory.now_playing().await.unwrap();
    assert!(!snapshot.is_playing);
    assert!(snapshot.item.is_none());
}

#[tokio::test]
async fn test_expired_token_refreshed_without_new_login() {
    let f = fixture(Some(expired("u1"))).await;
    let mut changes = f.store.subscribe();

    f.factory.now_playing().await.unwrap();

    let stored = f.store.get().unwrap();
    assert_eq!(stored.access_token, "fresh-1");
    assert_eq!(stored.refresh_token, "refresh-u1");
    assert_eq!(stored.id, "u1");
    assert!(stored.expires > Utc::now() + ChronoDuration::minutes(50));

    // the store did notify, but it classifies as nothing new
    let change = changes.try_recv().unwrap();
    assert!(SessionEvent::from_change(change).is_none());
}

#[tokio::test]
async fn test_rejected_token_refreshes_once() {
    let f = fixture(Some(UserSession { access_token: "stale".into(), ..session("u1") })).await;

    let snapshot = f.factory.now_playing().await.unwrap();
    assert!(snapshot.item.is_some());
    assert_eq!(f.spotify.state.token_calls.load(Ordering::SeqCst), 1);
    assert_eq!(f.spotify.state.playing_calls.load(Ordering::SeqCst), 2);
    assert_eq!(f.store.get().unwrap().access_token, "fresh-1");
}

#[tokio::test]
async fn test_revoked_refresh_token_is_auth_expired() {
    let f = fixture(Some(UserSession { refresh_token: "revoked".into(), ..expired("u1") })).await;

    let err = f.factory.now_playing().await.unwrap_err();
    match &err {
        ClientError::AuthExpired(reason) => assert!(reason.contains("invalid_grant")),
        other => panic!("expected AuthExpired, got {other:?}"),
    }
    assert!(!err.is_transient());
    assert_eq!(f.spotify.state.playing_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let f = fixture(Some(session("u1"))).await;
    f.spotify.state.set_mode(PlayerMode::RateLimited);

    let err = f.factory.now_playing().await.unwrap_err();
    assert!(matches!(err, ClientError::RateLimited { retry_after } if retry_after == Duration::from_secs(7)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_identity_lookup() {
    let f = fixture(Some(session("u1"))).await;

    let by_id = f.factory.get_client(Some("u1")).await.unwrap();
    assert_eq!(by_id.access_token(), Some("access-u1"));
    let by_email = f.factory.get_client(Some("u1@example.com")).await.unwrap();
    assert!(by_email.is_authenticated());

    assert!(matches!(f.factory.get_client(Some("someone-else")).await, Err(ClientError::NoSession)));

    let anonymous = f.factory.get_client(None).await.unwrap();
    assert!(!anonymous.is_authenticated());
}

#[tokio::test]
async fn test_logged_out_is_no_session() {
    let f = fixture(None).await;
    assert!(matches!(f.factory.now_playing().await, Err(ClientError::NoSession)));
    assert_eq!(f.spotify.state.playing_calls.load(Ordering::SeqCst), 0);
}
