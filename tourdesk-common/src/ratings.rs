//! Ratings aggregate maintenance
//!
//! Each tour stores `ratingsQuantity` and `ratingsAverage`, derived from its
//! reviews. Reviews change through three paths (create, update, delete) and no
//! transaction spans the review write and the tour write, so the aggregate is
//! eventually consistent:
//!
//! - create: the review commits, then [`RatingsEngine::after_create`] refreshes
//!   the tour named by the new review
//! - update/delete: [`RatingsEngine::begin_mutation`] captures the review's
//!   tour id *before* the atomic update/delete runs (a deleted row cannot be
//!   re-read), then [`RatingsEngine::commit`] refreshes that tour
//!
//! Refreshing is best-effort. A failed recompute or write is logged and not
//! retried; the review mutation that triggered it has already succeeded.
//!
//! Recompute-then-write is not atomic. Two mutations on the same tour can
//! interleave so the stored aggregate reflects whichever refresh finished last.
//! Any later refresh repairs it.

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use tracing::{debug, error, warn};

use crate::db::models::DEFAULT_RATINGS_AVERAGE;
use crate::{Error, Result};

/// `{count, avg}` of a tour's reviews
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingsAggregate {
    pub ratings_quantity: i64,
    pub ratings_average: f64,
}

impl RatingsAggregate {
    /// Aggregate of a tour without reviews
    pub const EMPTY: RatingsAggregate = RatingsAggregate {
        ratings_quantity: 0,
        ratings_average: DEFAULT_RATINGS_AVERAGE,
    };

    /// Build from a review count and the raw mean (`None` for an empty set)
    pub fn from_stats(count: i64, mean: Option<f64>) -> Self {
        match mean {
            Some(mean) if count > 0 && mean.is_finite() => Self {
                ratings_quantity: count,
                ratings_average: round_one_decimal(mean),
            },
            _ => Self::EMPTY,
        }
    }

    /// Aggregate over an in-memory set of ratings
    #[cfg(test)]
    fn from_ratings(ratings: &[i64]) -> Self {
        if ratings.is_empty() {
            return Self::EMPTY;
        }
        let sum: i64 = ratings.iter().sum();
        Self::from_stats(ratings.len() as i64, Some(sum as f64 / ratings.len() as f64))
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Pre-image captured before an atomic review update or delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewMutation {
    pub review_id: String,
    pub tour_id: String,
    /// Creator of the review, for ownership checks
    pub author_id: String,
}

#[derive(Debug, Clone)]
pub struct RatingsEngine {
    db: SqlitePool,
}

impl RatingsEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Compute `{count, avg}` over the live reviews of `tour_id`
    pub async fn recompute_aggregate(&self, tour_id: &str) -> Result<RatingsAggregate> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS quantity, AVG(rating) AS average FROM reviews WHERE tour_id = ?",
        )
        .bind(tour_id)
        .fetch_one(&self.db)
        .await?;

        let count: i64 = row.try_get("quantity")?;
        let mean: Option<f64> = row.try_get("average")?;
        Ok(RatingsAggregate::from_stats(count, mean))
    }

    /// Persist an aggregate onto its tour
    ///
    /// The only writer of `ratings_average` and `ratings_quantity`.
    pub async fn apply_aggregate(&self, tour_id: &str, aggregate: RatingsAggregate) -> Result<()> {
        let result = sqlx::query(
            "UPDATE tours SET ratings_quantity = ?, ratings_average = ? WHERE guid = ?",
        )
        .bind(aggregate.ratings_quantity)
        .bind(aggregate.ratings_average)
        .bind(tour_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Tour {}", tour_id)));
        }
        Ok(())
    }

    /// Recompute and persist, returning the aggregate that was written
    pub async fn refresh(&self, tour_id: &str) -> Result<RatingsAggregate> {
        let aggregate = self.recompute_aggregate(tour_id).await?;
        self.apply_aggregate(tour_id, aggregate).await?;
        debug!(
            "Tour {} ratings: {} reviews, average {}",
            tour_id, aggregate.ratings_quantity, aggregate.ratings_average
        );
        Ok(aggregate)
    }

    /// Best-effort refresh: failures are logged, never returned
    pub async fn refresh_best_effort(&self, tour_id: &str) -> Option<RatingsAggregate> {
        match self.refresh(tour_id).await {
            Ok(aggregate) => Some(aggregate),
            Err(Error::NotFound(_)) => {
                warn!("Tour {} vanished before its ratings could be refreshed", tour_id);
                None
            }
            Err(e) => {
                error!("Failed to refresh ratings for tour {}: {}", tour_id, e);
                None
            }
        }
    }

    /// Post-commit step of the create path
    pub async fn after_create(&self, tour_id: &str) -> Option<RatingsAggregate> {
        self.refresh_best_effort(tour_id).await
    }

    /// Capture the pre-image of a review about to be updated or deleted
    pub async fn begin_mutation(&self, review_id: &str) -> Result<ReviewMutation> {
        let row = sqlx::query("SELECT tour_id, user_id FROM reviews WHERE guid = ?")
            .bind(review_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| Error::NotFound(format!("No review found with id {}", review_id)))?;

        Ok(ReviewMutation {
            review_id: review_id.to_string(),
            tour_id: row.try_get("tour_id")?,
            author_id: row.try_get("user_id")?,
        })
    }

    /// Post-commit step of the update and delete paths
    pub async fn commit(&self, mutation: ReviewMutation) -> Option<RatingsAggregate> {
        self.refresh_best_effort(&mutation.tour_id).await
    }

    /// Capture every tour a user has reviewed, before the user (and, by
    /// cascade, their reviews) is deleted
    pub async fn begin_user_removal(&self, user_id: &str) -> Result<Vec<String>> {
        let tour_ids: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT tour_id FROM reviews WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&self.db)
                .await?;
        Ok(tour_ids)
    }

    /// Refresh each captured tour after a user removal commits
    pub async fn commit_user_removal(&self, tour_ids: Vec<String>) {
        for tour_id in tour_ids {
            self.refresh_best_effort(&tour_id).await;
        }
    }

    /// Refresh every tour, returning how many were written
    pub async fn refresh_all(&self) -> Result<usize> {
        let tour_ids: Vec<String> = sqlx::query_scalar("SELECT guid FROM tours")
            .fetch_all(&self.db)
            .await?;
        let mut refreshed = 0;
        for tour_id in &tour_ids {
            self.refresh(tour_id).await?;
            refreshed += 1;
        }
        Ok(refreshed)
    }
}
