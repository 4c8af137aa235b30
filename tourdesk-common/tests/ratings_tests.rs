//! Ratings aggregate maintenance across review create, update and delete

mod helpers;

use helpers::{insert_caller, insert_tour, setup_db};
use sqlx::SqlitePool;
use tourdesk_common::db::models::Role;
use tourdesk_common::db::reviews::{create_review, delete_review, get_review, update_review, ReviewInput};
use tourdesk_common::db::tours::get_tour;
use tourdesk_common::db::users::delete_user;
use tourdesk_common::{Error, RatingsAggregate, RatingsEngine};

fn review(rating: i64) -> ReviewInput {
    ReviewInput {
        review: Some(format!("Rated {}", rating)),
        rating: Some(rating),
        ..Default::default()
    }
}

async fn stored(db: &SqlitePool, tour_id: &str) -> (i64, f64) {
    let tour = get_tour(db, tour_id).await.unwrap().unwrap();
    (tour.ratings_quantity, tour.ratings_average)
}

#[tokio::test]
async fn test_create_then_delete_round_trip() {
    let (_dir, db) = setup_db().await;
    let engine = RatingsEngine::new(db.clone());
    let tour = insert_tour(&db, "The Forest Hiker", 397.0).await;
    let alice = insert_caller(&db, "Alice", Role::User).await;

    let created = create_review(&db, &engine, &alice, &tour.id, &review(5)).await.unwrap();
    assert_eq!(stored(&db, &tour.id).await, (1, 5.0));

    delete_review(&db, &engine, &alice, &created.id).await.unwrap();
    assert_eq!(stored(&db, &tour.id).await, (0, 4.5));
    assert!(get_review(&db, &created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_recomputes_average() {
    let (_dir, db) = setup_db().await;
    let engine = RatingsEngine::new(db.clone());
    let tour = insert_tour(&db, "The Sea Explorer", 497.0).await;
    let alice = insert_caller(&db, "Alice", Role::User).await;
    let bob = insert_caller(&db, "Bob", Role::User).await;

    create_review(&db, &engine, &alice, &tour.id, &review(4)).await.unwrap();
    let bobs = create_review(&db, &engine, &bob, &tour.id, &review(4)).await.unwrap();
    assert_eq!(stored(&db, &tour.id).await, (2, 4.0));

    let input = ReviewInput {
        rating: Some(5),
        ..Default::default()
    };
    let updated = update_review(&db, &engine, &bob, &bobs.id, &input).await.unwrap();
    assert_eq!(updated.rating, 5);
    assert_eq!(updated.review, "Rated 4");
    assert_eq!(stored(&db, &tour.id).await, (2, 4.5));
}

#[tokio::test]
async fn test_average_rounds_to_one_decimal() {
    let (_dir, db) = setup_db().await;
    let engine = RatingsEngine::new(db.clone());
    let tour = insert_tour(&db, "The Snow Adventurer", 997.0).await;

    for (name, rating) in [("Ann", 4), ("Ben", 4), ("Cat", 5)] {
        let caller = insert_caller(&db, name, Role::User).await;
        create_review(&db, &engine, &caller, &tour.id, &review(rating)).await.unwrap();
    }

    assert_eq!(stored(&db, &tour.id).await, (3, 4.3));
}

#[tokio::test]
async fn test_duplicate_review_rejected_before_write() {
    let (_dir, db) = setup_db().await;
    let engine = RatingsEngine::new(db.clone());
    let tour = insert_tour(&db, "The City Wanderer", 1197.0).await;
    let alice = insert_caller(&db, "Alice", Role::User).await;

    create_review(&db, &engine, &alice, &tour.id, &review(3)).await.unwrap();
    let second = create_review(&db, &engine, &alice, &tour.id, &review(5)).await;

    assert!(matches!(second, Err(Error::Conflict(_))));
    assert_eq!(stored(&db, &tour.id).await, (1, 3.0));
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_failed_aggregate_write_keeps_review_mutations() {
    let (_dir, db) = setup_db().await;
    let engine = RatingsEngine::new(db.clone());
    let tour = insert_tour(&db, "The Northern Lights", 1497.0).await;
    let alice = insert_caller(&db, "Alice", Role::User).await;

    sqlx::query(
        "CREATE TRIGGER block_ratings BEFORE UPDATE OF ratings_average ON tours \
         BEGIN SELECT RAISE(ABORT, 'ratings locked'); END",
    )
    .execute(&db)
    .await
    .unwrap();

    let created = create_review(&db, &engine, &alice, &tour.id, &review(2)).await.unwrap();
    assert!(get_review(&db, &created.id).await.unwrap().is_some());
    assert_eq!(stored(&db, &tour.id).await, (0, 4.5));

    let updated = update_review(&db, &engine, &alice, &created.id, &review(5)).await.unwrap();
    assert_eq!(updated.rating, 5);
    assert_eq!(stored(&db, &tour.id).await, (0, 4.5));

    delete_review(&db, &engine, &alice, &created.id).await.unwrap();
    assert!(get_review(&db, &created.id).await.unwrap().is_none());
    assert_eq!(stored(&db, &tour.id).await, (0, 4.5));
}

#[tokio::test]
async fn test_review_on_missing_tour_rejected() {
    let (_dir, db) = setup_db().await;
    let engine = RatingsEngine::new(db.clone());
    let alice = insert_caller(&db, "Alice", Role::User).await;

    let result = create_review(
        &db,
        &engine,
        &alice,
        "00000000-0000-0000-0000-000000000000",
        &review(4),
    )
    .await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_non_owner_cannot_mutate() {
    let (_dir, db) = setup_db().await;
    let engine = RatingsEngine::new(db.clone());
    let tour = insert_tour(&db, "The Park Camper", 1497.0).await;
    let alice = insert_caller(&db, "Alice", Role::User).await;
    let mallory = insert_caller(&db, "Mallory", Role::User).await;

    let created = create_review(&db, &engine, &alice, &tour.id, &review(5)).await.unwrap();

    let update = update_review(&db, &engine, &mallory, &created.id, &review(1)).await;
    assert!(matches!(update, Err(Error::Forbidden(_))));
    let delete = delete_review(&db, &engine, &mallory, &created.id).await;
    assert!(matches!(delete, Err(Error::Forbidden(_))));

    assert_eq!(get_review(&db, &created.id).await.unwrap().unwrap().rating, 5);
    assert_eq!(stored(&db, &tour.id).await, (1, 5.0));
}

#[tokio::test]
async fn test_admin_may_delete_any_review() {
    let (_dir, db) = setup_db().await;
    let engine = RatingsEngine::new(db.clone());
    let tour = insert_tour(&db, "The Sports Lover", 2997.0).await;
    let alice = insert_caller(&db, "Alice", Role::User).await;
    let admin = insert_caller(&db, "Root", Role::Admin).await;

    let created = create_review(&db, &engine, &alice, &tour.id, &review(2)).await.unwrap();
    delete_review(&db, &engine, &admin, &created.id).await.unwrap();

    assert_eq!(stored(&db, &tour.id).await, (0, 4.5));
}

#[tokio::test]
async fn test_missing_review_is_not_found() {
    let (_dir, db) = setup_db().await;
    let engine = RatingsEngine::new(db.clone());
    let alice = insert_caller(&db, "Alice", Role::User).await;

    let result = delete_review(&db, &engine, &alice, "no-such-review").await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_user_removal_refreshes_reviewed_tours() {
    let (_dir, db) = setup_db().await;
    let engine = RatingsEngine::new(db.clone());
    let tour = insert_tour(&db, "The Wine Taster", 1997.0).await;
    let alice = insert_caller(&db, "Alice", Role::User).await;
    let bob = insert_caller(&db, "Bob", Role::User).await;

    create_review(&db, &engine, &alice, &tour.id, &review(1)).await.unwrap();
    create_review(&db, &engine, &bob, &tour.id, &review(5)).await.unwrap();
    assert_eq!(stored(&db, &tour.id).await, (2, 3.0));

    delete_user(&db, &engine, &alice.user_id).await.unwrap();
    assert_eq!(stored(&db, &tour.id).await, (1, 5.0));
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let (_dir, db) = setup_db().await;
    let engine = RatingsEngine::new(db.clone());
    let tour = insert_tour(&db, "The Star Gazer", 2997.0).await;
    let alice = insert_caller(&db, "Alice", Role::User).await;
    create_review(&db, &engine, &alice, &tour.id, &review(4)).await.unwrap();

    let first = engine.refresh(&tour.id).await.unwrap();
    let second = engine.refresh(&tour.id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(stored(&db, &tour.id).await, (1, 4.0));
}

#[tokio::test]
async fn test_refresh_without_reviews_resets_default() {
    let (_dir, db) = setup_db().await;
    let engine = RatingsEngine::new(db.clone());
    let tour = insert_tour(&db, "The Northern Lights", 1497.0).await;

    // Simulate a stale aggregate left behind by an interrupted refresh
    engine
        .apply_aggregate(
            &tour.id,
            RatingsAggregate {
                ratings_quantity: 7,
                ratings_average: 2.0,
            },
        )
        .await
        .unwrap();

    let aggregate = engine.refresh(&tour.id).await.unwrap();
    assert_eq!(aggregate, RatingsAggregate::EMPTY);
    assert_eq!(stored(&db, &tour.id).await, (0, 4.5));
}

#[tokio::test]
async fn test_apply_to_missing_tour_is_not_found() {
    let (_dir, db) = setup_db().await;
    let engine = RatingsEngine::new(db.clone());

    let result = engine.apply_aggregate("gone", RatingsAggregate::EMPTY).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
    assert!(engine.refresh_best_effort("gone").await.is_none());
}

#[tokio::test]
async fn test_concurrent_creates_converge_after_refresh() {
    let (_dir, db) = setup_db().await;
    let engine = RatingsEngine::new(db.clone());
    let tour = insert_tour(&db, "The Desert Rider", 797.0).await;

    let mut callers = Vec::new();
    for i in 0..6 {
        callers.push(insert_caller(&db, &format!("Rider{}", i), Role::User).await);
    }

    let input = review(4);
    let writes = callers
        .iter()
        .map(|caller| create_review(&db, &engine, caller, &tour.id, &input));
    let results = futures::future::join_all(writes).await;
    assert!(results.iter().all(|r| r.is_ok()));

    // Interleaved refreshes may leave a lagging count; any later refresh repairs it
    engine.refresh(&tour.id).await.unwrap();
    assert_eq!(stored(&db, &tour.id).await, (6, 4.0));
}

#[tokio::test]
async fn test_refresh_all_covers_every_tour() {
    let (_dir, db) = setup_db().await;
    let engine = RatingsEngine::new(db.clone());
    insert_tour(&db, "One", 100.0).await;
    insert_tour(&db, "Two", 200.0).await;

    assert_eq!(engine.refresh_all().await.unwrap(), 2);
}
