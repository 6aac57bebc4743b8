//! Tests for cache mirrors and lobby queries fed by the snapshot stream.

use gridmatch::{
    Collection, CollectionCache, DocumentStore, LobbyView, MemoryStore, Player, SessionEngine,
};
use std::sync::Arc;
use std::time::Duration;

/// Polls until `check` passes or a short deadline expires. The snapshot
/// stream is applied by a background task, so mirrors converge shortly
/// after a write rather than instantly.
async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within deadline");
}

#[tokio::test]
async fn cache_seeds_from_existing_documents() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let engine = SessionEngine::new(Arc::clone(&store));

    let alice = engine.create_player("Alice").await.unwrap();
    let cache: CollectionCache<Player> = CollectionCache::new(&store, Collection::Players)
        .await
        .unwrap();

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&alice).unwrap().name(), "Alice");
}

#[tokio::test]
async fn cache_follows_later_changes() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let engine = SessionEngine::new(Arc::clone(&store));

    let cache: CollectionCache<Player> = CollectionCache::new(&store, Collection::Players)
        .await
        .unwrap();
    assert!(cache.is_empty());

    engine.create_player("Alice").await.unwrap();
    engine.create_player("Bob").await.unwrap();

    let mirror = cache.clone();
    eventually(move || mirror.len() == 2).await;
}

#[tokio::test]
async fn lobby_tracks_invites_from_both_sides() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let engine = SessionEngine::new(Arc::clone(&store));

    let alice = engine.create_player("Alice").await.unwrap();
    let bob = engine.create_player("Bob").await.unwrap();
    let game = engine.create_invite(&alice, &bob).await.unwrap();

    let bobs_lobby = LobbyView::new(&store, bob.clone()).await.unwrap();
    let incoming = bobs_lobby.incoming_invites();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].0, game);
    assert_eq!(incoming[0].1.player_x(), &alice);
    assert!(bobs_lobby.outgoing_invites().is_empty());

    let alices_lobby = LobbyView::new(&store, alice.clone()).await.unwrap();
    assert_eq!(alices_lobby.outgoing_invites().len(), 1);
    assert!(alices_lobby.incoming_invites().is_empty());
}

#[tokio::test]
async fn accepting_an_invite_makes_the_session_active() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let engine = SessionEngine::new(Arc::clone(&store));

    let alice = engine.create_player("Alice").await.unwrap();
    let bob = engine.create_player("Bob").await.unwrap();
    let game = engine.create_invite(&alice, &bob).await.unwrap();

    let lobby = LobbyView::new(&store, alice.clone()).await.unwrap();
    assert_eq!(lobby.active_session(), None);

    engine.accept_invite(&game).await.unwrap();

    let mirror = lobby.clone();
    eventually(move || mirror.active_session() == Some(game.clone())).await;
    assert!(lobby.incoming_invites().is_empty());
}

#[tokio::test]
async fn declined_invite_disappears_from_the_lobby() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let engine = SessionEngine::new(Arc::clone(&store));

    let alice = engine.create_player("Alice").await.unwrap();
    let bob = engine.create_player("Bob").await.unwrap();
    let game = engine.create_invite(&alice, &bob).await.unwrap();

    let lobby = LobbyView::new(&store, bob.clone()).await.unwrap();
    assert_eq!(lobby.incoming_invites().len(), 1);

    engine.decline_invite(&game).await.unwrap();

    let mirror = lobby.clone();
    eventually(move || mirror.incoming_invites().is_empty()).await;
}

#[tokio::test]
async fn roster_lists_challengers_first() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let engine = SessionEngine::new(Arc::clone(&store));

    let alice = engine.create_player("Alice").await.unwrap();
    let bob = engine.create_player("Bob").await.unwrap();
    let carol = engine.create_player("Carol").await.unwrap();

    // Carol challenges Bob; Alice registered first but did not.
    engine.create_invite(&carol, &bob).await.unwrap();

    let lobby = LobbyView::new(&store, bob.clone()).await.unwrap();
    let roster = lobby.roster();
    assert_eq!(roster.len(), 2);
    assert_eq!(roster[0].0, carol);
    assert_eq!(roster[1].0, alice);
    assert_eq!(lobby.player_name(&alice).as_deref(), Some("Alice"));
}
