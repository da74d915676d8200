//! End-to-end behaviour of the query cache behind the application services.

use std::sync::Arc;
use std::time::Duration;

use quire::application::auth::{AuthService, callback};
use quire::application::feed::FeedService;
use quire::application::gateway::GatewayError;
use quire::application::profile::ProfileService;
use quire::application::todos::TodoQueries;
use quire::cache::{CacheConfig, CacheKey, QueryCache, QueryValue};
use quire::infra::remote::MemoryBackend;
use quire::stores::{ModalState, ModalStore, SessionStore};
use url::Url;

fn short_lived() -> CacheConfig {
    CacheConfig {
        stale_after_ms: 1_000,
        evict_after_ms: 2_000,
        todo_detail_stale_after_ms: 1_000,
        todo_detail_evict_after_ms: 2_000,
        max_entries: 64,
        gc_interval_ms: 500,
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_readers_share_one_list_load() {
    let backend = Arc::new(MemoryBackend::new());
    backend.insert_todo("write tests", false);
    backend.insert_todo("ship", true);
    backend.set_latency(Some(Duration::from_millis(200)));

    let queries = TodoQueries::new(QueryCache::new(CacheConfig::default()), backend.clone());

    let (first, second) = tokio::join!(queries.items(), queries.items());

    let first = first.expect("first reader");
    assert_eq!(first, second.expect("second reader"));
    assert_eq!(first.len(), 2);
    assert_eq!(backend.calls().todo_fetch_all, 1);
    assert_eq!(backend.calls().todo_fetch_by_id, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_list_load_is_retried_on_next_read() {
    let backend = Arc::new(MemoryBackend::new());
    backend.insert_todo("flaky", false);
    let queries = TodoQueries::new(QueryCache::new(CacheConfig::default()), backend.clone());

    backend.fail_with(GatewayError::remote("connection reset"));
    assert!(queries.list().await.is_err());

    backend.recover();
    assert_eq!(queries.list().await.expect("recovered").len(), 1);
    assert_eq!(backend.calls().todo_fetch_all, 2);
}

#[tokio::test(start_paused = true)]
async fn stale_detail_is_reloaded_from_the_gateway() {
    let backend = Arc::new(MemoryBackend::new());
    let id = backend.insert_todo("read me", false);
    let queries = TodoQueries::new(QueryCache::new(short_lived()), backend.clone());

    queries.detail(id).await.expect("first load");
    queries.detail(id).await.expect("fresh hit");
    assert_eq!(backend.calls().todo_fetch_by_id, 1);

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    queries.detail(id).await.expect("stale reload");
    assert_eq!(backend.calls().todo_fetch_by_id, 2);
}

#[tokio::test(start_paused = true)]
async fn sweeper_drops_unobserved_entries_only() {
    let cache = QueryCache::new(short_lived());
    let _sweeper = cache.spawn_sweeper();

    cache.seed(CacheKey::TodoList, QueryValue::Ids(vec![1, 2]));
    cache.seed(CacheKey::PostList, QueryValue::Posts(Vec::new()));
    let observer = cache.subscribe(CacheKey::TodoList);

    tokio::time::sleep(Duration::from_millis(3_000)).await;

    assert!(cache.get(&CacheKey::TodoList).is_some());
    assert!(cache.get(&CacheKey::PostList).is_none());

    drop(observer);
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert!(cache.is_empty());
}

#[tokio::test]
async fn own_profile_is_created_once_and_cleared_on_sign_out() {
    let backend = Arc::new(MemoryBackend::new());
    let cache = QueryCache::new(CacheConfig::default());
    let session = SessionStore::new();
    let auth = AuthService::new(backend.clone(), session.clone(), cache.clone());
    let profiles = ProfileService::new(cache.clone(), backend.clone(), session.clone());

    let code = backend.issue_code("new@example.com");
    let callback_url =
        Url::parse(&format!("https://app.example/auth/callback?code={code}&next=/profile"))
            .expect("callback url");
    assert_eq!(callback::resolve(&auth, &callback_url).await, "/profile");

    let user_id = session.user_id().expect("signed in");
    let created = profiles.load(user_id).await.expect("profile created");
    assert!(!created.nickname.is_empty());
    assert_eq!(profiles.load(user_id).await.expect("cached"), created);
    assert_eq!(backend.calls().profile_create, 1);
    assert_eq!(backend.calls().profile_fetch_by_id, 1);

    auth.sign_out();
    assert!(session.current().is_none());
    assert!(cache.is_empty());

    let err = profiles.load(user_id).await.expect_err("no auto-create when signed out");
    assert!(err.is_not_found());
    assert_eq!(backend.calls().profile_create, 1);
}

#[tokio::test]
async fn editor_submission_refreshes_feed() {
    let backend = Arc::new(MemoryBackend::new());
    let session = SessionStore::new();
    session.set(backend.session_for("author@example.com"));
    let feed = FeedService::new(
        QueryCache::new(CacheConfig::default()),
        backend.clone(),
        session,
    );
    let modal = ModalStore::new();

    assert!(feed.posts().await.expect("empty feed").is_empty());

    modal.open_create();
    let created = feed
        .submit_editor(&modal, "hello there", None)
        .await
        .expect("created");
    assert_eq!(modal.state(), ModalState::Closed);

    let posts = feed.posts().await.expect("refreshed feed");
    assert_eq!(posts, vec![created.clone()]);

    modal.open_edit(created.id, created.content.clone(), None);
    let edited = feed
        .submit_editor(&modal, "hello again", Some(vec!["a.png".to_string()]))
        .await
        .expect("edited");
    assert_eq!(edited.content, "hello again");
    assert_eq!(feed.posts().await.expect("feed")[0].content, "hello again");
    assert_eq!(backend.calls().post_fetch_all, 3);
}
