use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use bookmark_tracker_backend::{
    models::tracking_session::{MetadataValue, SessionMetadata, SessionType, TrackingSession},
    repositories::{EndedSessionFilter, PgSessionStore, SessionStore, SessionUpdate, StoreError},
    services::{TimeStatsService, TimeTrackingService},
    types::UserId,
    utils::SystemClock,
};

mod support;

use support::{seed_bookmark, test_pool, unique_user};

fn session_for(
    bookmark_id: &bookmark_tracker_backend::types::BookmarkId,
    user_id: &UserId,
    offset_secs: i64,
) -> TrackingSession {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    TrackingSession::new(
        bookmark_id.clone(),
        user_id.clone(),
        SessionType::Reading,
        [("source", "test")].into_iter().collect(),
        start + ChronoDuration::seconds(offset_secs),
    )
}

#[tokio::test]
async fn insert_round_trips_session_fields() {
    let pool = test_pool().await;
    let store = PgSessionStore::new(pool.clone());
    let user = unique_user();
    let bookmark = seed_bookmark(&pool, &user).await;

    let session = session_for(&bookmark, &user, 0);
    let created = store.insert(&session).await.expect("insert");
    assert_eq!(created, session);

    let found = store
        .find_by_id(session.id)
        .await
        .expect("find")
        .expect("present");
    assert_eq!(found.session_type, SessionType::Reading);
    assert_eq!(
        found.metadata.get("source"),
        Some(&MetadataValue::Text("test".into()))
    );
    assert!(found.is_active());
}

#[tokio::test]
async fn second_active_session_for_pair_is_rejected() {
    let pool = test_pool().await;
    let store = PgSessionStore::new(pool.clone());
    let user = unique_user();
    let bookmark = seed_bookmark(&pool, &user).await;

    store
        .insert(&session_for(&bookmark, &user, 0))
        .await
        .expect("first insert");
    let err = store
        .insert(&session_for(&bookmark, &user, 10))
        .await
        .expect_err("second active session");
    assert!(matches!(err, StoreError::ActiveSessionExists { .. }));
}

#[tokio::test]
async fn bookmark_of_another_user_is_not_visible() {
    let pool = test_pool().await;
    let store = PgSessionStore::new(pool.clone());
    let owner = unique_user();
    let stranger = unique_user();
    let bookmark = seed_bookmark(&pool, &owner).await;

    let err = store
        .insert(&session_for(&bookmark, &stranger, 0))
        .await
        .expect_err("not visible");
    assert!(matches!(err, StoreError::BookmarkNotVisible));
}

#[tokio::test]
async fn bookmark_title_is_visible_to_owner_only() {
    let pool = test_pool().await;
    let store = PgSessionStore::new(pool.clone());
    let owner = unique_user();
    let bookmark = seed_bookmark(&pool, &owner).await;

    let title = store.bookmark_title(&owner, &bookmark).await.expect("title");
    assert_eq!(title.as_deref(), Some("Rust book"));

    let stranger = unique_user();
    assert!(store
        .bookmark_title(&stranger, &bookmark)
        .await
        .expect("title")
        .is_none());
}

#[tokio::test]
async fn update_applies_only_once() {
    let pool = test_pool().await;
    let store = PgSessionStore::new(pool.clone());
    let user = unique_user();
    let bookmark = seed_bookmark(&pool, &user).await;
    let session = store
        .insert(&session_for(&bookmark, &user, 0))
        .await
        .expect("insert");

    let first = SessionUpdate {
        ended_at: session.started_at + ChronoDuration::seconds(42),
        duration_seconds: 42,
    };
    let ended = store
        .update(session.id, &first)
        .await
        .expect("update")
        .expect("was active");
    assert_eq!(ended.duration_seconds, Some(42));

    let second = SessionUpdate {
        ended_at: session.started_at + ChronoDuration::seconds(99),
        duration_seconds: 99,
    };
    assert!(store.update(session.id, &second).await.expect("update").is_none());

    // A new active session is allowed once the previous one ended.
    store
        .insert(&session_for(&bookmark, &user, 100))
        .await
        .expect("insert after end");
}

#[tokio::test]
async fn find_ended_filters_by_bookmark_and_range() {
    let pool = test_pool().await;
    let store = PgSessionStore::new(pool.clone());
    let user = unique_user();
    let first_bookmark = seed_bookmark(&pool, &user).await;
    let second_bookmark = seed_bookmark(&pool, &user).await;

    for (bookmark, offset) in [
        (&first_bookmark, 0),
        (&first_bookmark, 3_600),
        (&second_bookmark, 7_200),
    ] {
        let session = store
            .insert(&session_for(bookmark, &user, offset))
            .await
            .expect("insert");
        let update = SessionUpdate {
            ended_at: session.started_at + ChronoDuration::seconds(60),
            duration_seconds: 60,
        };
        store.update(session.id, &update).await.expect("update");
    }
    store
        .insert(&session_for(&first_bookmark, &user, 10_000))
        .await
        .expect("active session");

    let all = store
        .find_ended(&user, &EndedSessionFilter::default())
        .await
        .expect("all");
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].started_at <= w[1].started_at));

    let by_bookmark = store
        .find_ended(&user, &EndedSessionFilter::for_bookmark(first_bookmark.clone()))
        .await
        .expect("by bookmark");
    assert_eq!(by_bookmark.len(), 2);

    let start = Utc.with_ymd_and_hms(2024, 5, 1, 1, 0, 0).unwrap();
    let in_range = store
        .find_ended(
            &user,
            &EndedSessionFilter::started_between(start, start + ChronoDuration::hours(1)),
        )
        .await
        .expect("range");
    assert_eq!(in_range.len(), 1);
    assert_eq!(in_range[0].bookmark_id, first_bookmark);

    let recent = store
        .find_recent(&user, &first_bookmark, 2)
        .await
        .expect("recent");
    assert_eq!(recent.len(), 2);
    assert!(recent[0].is_active());
}

#[tokio::test]
async fn concurrent_starts_leave_one_active_session() {
    let pool = test_pool().await;
    let store: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool.clone()));
    let user = unique_user();
    let bookmark = seed_bookmark(&pool, &user).await;
    let service = TimeTrackingService::new(
        store.clone(),
        Arc::new(SystemClock::new(chrono_tz::UTC)),
        Duration::from_secs(5),
    );

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        let bookmark = bookmark.to_string();
        let user = user.to_string();
        handles.push(tokio::spawn(async move {
            service
                .start_session(&bookmark, &user, SessionType::View, SessionMetadata::new())
                .await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let session = handle.await.expect("join").expect("start");
        ids.push(session.id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "every caller should see the same session");

    let active = store.find_active(&user, &bookmark).await.expect("active");
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn lifecycle_and_stats_against_postgres() {
    let pool = test_pool().await;
    let store: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool.clone()));
    let user = unique_user();
    let bookmark = seed_bookmark(&pool, &user).await;
    let clock = Arc::new(SystemClock::new(chrono_tz::UTC));
    let tracker = TimeTrackingService::new(store.clone(), clock.clone(), Duration::from_secs(5));
    let stats = TimeStatsService::new(store, clock, chrono_tz::UTC, Duration::from_secs(5));

    let started = tracker
        .start_session(bookmark.as_str(), user.as_str(), SessionType::Focus, SessionMetadata::new())
        .await
        .expect("start");
    let ended = tracker
        .end_session(&started.id.to_string(), user.as_str())
        .await
        .expect("end");
    assert!(!ended.is_active());
    let again = tracker
        .end_session(&started.id.to_string(), user.as_str())
        .await
        .expect("end again");
    assert_eq!(again, ended);

    let summary = stats
        .get_bookmark_time_stats(bookmark.as_str(), user.as_str())
        .await
        .expect("stats");
    assert_eq!(summary.session_count, 1);
    assert_eq!(summary.total_time_spent, ended.duration_seconds.unwrap_or_default());
}
