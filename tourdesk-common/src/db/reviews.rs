//! Review queries
//!
//! Every mutation here ends by refreshing the owning tour's ratings aggregate.
//! Update and delete capture the review's pre-image first (tour id and author)
//! because the atomic statements that follow leave nothing to re-read.

use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use super::models::Review;
use crate::api::auth::{authorize_owner, Caller};
use crate::error::FieldError;
use crate::ratings::RatingsEngine;
use crate::{time, uuid_utils, Error, Result};

/// Client-supplied review fields
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    pub review: Option<String>,
    pub rating: Option<i64>,
    #[serde(alias = "tour")]
    pub tour_id: Option<String>,
    #[serde(alias = "user")]
    pub user_id: Option<String>,
}

impl ReviewInput {
    pub fn validate(&self, require_all: bool) -> Result<()> {
        let mut errors = Vec::new();

        match self.review.as_deref().map(str::trim) {
            Some("") => errors.push(FieldError::new("review", "Please add a review")),
            None if require_all => errors.push(FieldError::new("review", "Please add a review")),
            _ => {}
        }

        match self.rating {
            Some(r) if r < 1 => errors.push(FieldError::new(
                "rating",
                "Rating must be at least 1 or greater than 1",
            )),
            Some(r) if r > 5 => {
                errors.push(FieldError::new("rating", "Rating can be 5 or less than 5"))
            }
            None if require_all => errors.push(FieldError::new("rating", "Please add a rating")),
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors))
        }
    }
}

pub async fn get_review(db: &SqlitePool, id: &str) -> Result<Option<Review>> {
    let row = sqlx::query("SELECT * FROM reviews WHERE guid = ?")
        .bind(id)
        .fetch_optional(db)
        .await?;
    row.map(|r| Review::from_row(&r)).transpose().map_err(Into::into)
}

/// Create a review by `caller` on `tour_id`, then refresh the tour's ratings
///
/// A second review by the same user on the same tour is a conflict, detected
/// before anything is written.
pub async fn create_review(
    db: &SqlitePool,
    engine: &RatingsEngine,
    caller: &Caller,
    tour_id: &str,
    input: &ReviewInput,
) -> Result<Review> {
    input.validate(true)?;

    if !uuid_utils::is_valid(tour_id) || !super::tours::tour_exists(db, tour_id).await? {
        return Err(Error::invalid("tourId", "Please enter a valid tour"));
    }

    let duplicate: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM reviews WHERE tour_id = ? AND user_id = ?")
            .bind(tour_id)
            .bind(&caller.user_id)
            .fetch_optional(db)
            .await?;
    if duplicate.is_some() {
        return Err(Error::Conflict(
            "You already wrote a review for this tour".to_string(),
        ));
    }

    let now = time::now();
    let row = sqlx::query(
        r#"
        INSERT INTO reviews (guid, review, rating, tour_id, user_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(uuid_utils::generate())
    .bind(input.review.as_deref().map(str::trim))
    .bind(input.rating)
    .bind(tour_id)
    .bind(&caller.user_id)
    .bind(now)
    .bind(now)
    .fetch_one(db)
    .await
    .map_err(|e| {
        let err = Error::from(e);
        if err.is_unique_violation() {
            Error::Conflict("You already wrote a review for this tour".to_string())
        } else {
            err
        }
    })?;
    let review = Review::from_row(&row)?;

    engine.after_create(&review.tour_id).await;
    Ok(review)
}

/// Update text and/or rating of a review owned by `caller` (or any, for admins)
pub async fn update_review(
    db: &SqlitePool,
    engine: &RatingsEngine,
    caller: &Caller,
    review_id: &str,
    input: &ReviewInput,
) -> Result<Review> {
    input.validate(false)?;
    if input.tour_id.is_some() || input.user_id.is_some() {
        return Err(Error::invalid(
            "tourId",
            "A review cannot be moved to another tour or user",
        ));
    }

    let mutation = engine.begin_mutation(review_id).await?;
    authorize_owner(caller, &mutation.author_id)?;

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE reviews SET version = version + 1, updated_at = ");
    qb.push_bind(time::now());
    if let Some(text) = input.review.as_deref().map(str::trim) {
        qb.push(", review = ").push_bind(text.to_string());
    }
    if let Some(rating) = input.rating {
        qb.push(", rating = ").push_bind(rating);
    }
    qb.push(" WHERE guid = ").push_bind(review_id.to_string());
    qb.push(" RETURNING *");

    let row = qb
        .build()
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No review found with id {}", review_id)))?;
    let review = Review::from_row(&row)?;

    engine.commit(mutation).await;
    Ok(review)
}

/// Delete a review owned by `caller` (or any, for admins)
pub async fn delete_review(
    db: &SqlitePool,
    engine: &RatingsEngine,
    caller: &Caller,
    review_id: &str,
) -> Result<()> {
    let mutation = engine.begin_mutation(review_id).await?;
    authorize_owner(caller, &mutation.author_id)?;

    let deleted: Option<String> =
        sqlx::query_scalar("DELETE FROM reviews WHERE guid = ? RETURNING guid")
            .bind(review_id)
            .fetch_optional(db)
            .await?;
    if deleted.is_none() {
        // Lost a race with another delete; nothing changed on our side
        debug!("Review {} already deleted", review_id);
        return Err(Error::NotFound(format!("No review found with id {}", review_id)));
    }

    engine.commit(mutation).await;
    Ok(())
}
