//! Tour queries
//!
//! Clients write the descriptive fields only. `ratings_average` and
//! `ratings_quantity` are written by [`crate::ratings::RatingsEngine`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::models::{Difficulty, Tour};
use crate::error::FieldError;
use crate::{time, uuid_utils, Error, Result};

/// Client-supplied tour fields, for both create and partial update
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourInput {
    pub name: Option<String>,
    pub duration: Option<i64>,
    pub max_group_size: Option<i64>,
    pub difficulty: Option<String>,
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    // Derived fields; accepted by the parser only so they can be rejected
    pub ratings_average: Option<f64>,
    pub ratings_quantity: Option<i64>,
}

impl TourInput {
    /// Check field values; with `require_all` the create-time required fields
    /// must be present
    pub fn validate(&self, require_all: bool) -> Result<()> {
        let mut errors = Vec::new();

        if self.ratings_average.is_some() {
            errors.push(FieldError::new(
                "ratingsAverage",
                "ratingsAverage is derived from reviews and cannot be set",
            ));
        }
        if self.ratings_quantity.is_some() {
            errors.push(FieldError::new(
                "ratingsQuantity",
                "ratingsQuantity is derived from reviews and cannot be set",
            ));
        }

        match trimmed(&self.name) {
            Some(name) if name.is_empty() => {
                errors.push(FieldError::new("name", "Please provide a name"))
            }
            None if require_all => errors.push(FieldError::new("name", "Please provide a name")),
            _ => {}
        }

        match self.duration {
            Some(d) if d <= 0 => errors.push(FieldError::new(
                "duration",
                "Duration must be a positive number of days",
            )),
            None if require_all => {
                errors.push(FieldError::new("duration", "Please provide duration"))
            }
            _ => {}
        }

        match self.max_group_size {
            Some(size) if size <= 0 => errors.push(FieldError::new(
                "maxGroupSize",
                "Maximum Group Size must be positive",
            )),
            None if require_all => errors.push(FieldError::new(
                "maxGroupSize",
                "Please provide Maximum Group Size",
            )),
            _ => {}
        }

        match &self.difficulty {
            Some(d) if d.parse::<Difficulty>().is_err() => errors.push(FieldError::new(
                "difficulty",
                "Difficulty is either: easy, medium, difficult",
            )),
            None if require_all => {
                errors.push(FieldError::new("difficulty", "Please provide difficulty"))
            }
            _ => {}
        }

        match self.price {
            Some(p) if !p.is_finite() || p < 0.0 => {
                errors.push(FieldError::new("price", "Price must not be negative"))
            }
            None if require_all => errors.push(FieldError::new("price", "Please provide a price")),
            _ => {}
        }

        if let (Some(discount), Some(price)) = (self.price_discount, self.price) {
            if !discount.is_finite() || discount < 0.0 || discount >= price {
                errors.push(FieldError::new(
                    "priceDiscount",
                    "Discount price should be below regular price",
                ));
            }
        }

        match trimmed(&self.summary) {
            Some(s) if s.is_empty() => {
                errors.push(FieldError::new("summary", "Please provide summary"))
            }
            None if require_all => {
                errors.push(FieldError::new("summary", "Please provide summary"))
            }
            _ => {}
        }

        match trimmed(&self.image_cover) {
            Some(s) if s.is_empty() => {
                errors.push(FieldError::new("imageCover", "Please provide imageCover"))
            }
            None if require_all => {
                errors.push(FieldError::new("imageCover", "Please provide imageCover"))
            }
            _ => {}
        }

        if let Some(images) = &self.images {
            if images.iter().any(|i| i.trim().is_empty()) {
                errors.push(FieldError::new("images", "Image names must not be empty"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors))
        }
    }
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim)
}

pub async fn get_tour(db: &SqlitePool, id: &str) -> Result<Option<Tour>> {
    let row = sqlx::query("SELECT * FROM tours WHERE guid = ?")
        .bind(id)
        .fetch_optional(db)
        .await?;
    row.map(|r| Tour::from_row(&r)).transpose().map_err(Into::into)
}

pub async fn tour_exists(db: &SqlitePool, id: &str) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM tours WHERE guid = ?")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(found.is_some())
}

/// Insert a new tour with the default (empty) ratings aggregate
pub async fn create_tour(db: &SqlitePool, input: &TourInput) -> Result<Tour> {
    input.validate(true)?;

    let name = trimmed(&input.name).unwrap_or_default();
    let existing: Option<i64> = sqlx::query_scalar("SELECT 1 FROM tours WHERE name = ?")
        .bind(name)
        .fetch_optional(db)
        .await?;
    if existing.is_some() {
        return Err(Error::Conflict("Tour already exists".to_string()));
    }

    let now = time::now();
    let row = sqlx::query(
        r#"
        INSERT INTO tours (
            guid, name, duration, max_group_size, difficulty, price, price_discount,
            summary, description, image_cover, images, start_dates, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(uuid_utils::generate())
    .bind(name)
    .bind(input.duration)
    .bind(input.max_group_size)
    .bind(&input.difficulty)
    .bind(input.price)
    .bind(input.price_discount)
    .bind(trimmed(&input.summary))
    .bind(trimmed(&input.description))
    .bind(trimmed(&input.image_cover))
    .bind(Json(input.images.as_deref().unwrap_or_default()))
    .bind(Json(input.start_dates.as_deref().unwrap_or_default()))
    .bind(now)
    .bind(now)
    .fetch_one(db)
    .await?;

    Ok(Tour::from_row(&row)?)
}

/// Apply a partial update in one statement
pub async fn update_tour(db: &SqlitePool, id: &str, input: &TourInput) -> Result<Tour> {
    input.validate(false)?;

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE tours SET version = version + 1, updated_at = ");
    qb.push_bind(time::now());

    if let Some(name) = trimmed(&input.name) {
        qb.push(", name = ").push_bind(name.to_string());
    }
    if let Some(duration) = input.duration {
        qb.push(", duration = ").push_bind(duration);
    }
    if let Some(size) = input.max_group_size {
        qb.push(", max_group_size = ").push_bind(size);
    }
    if let Some(difficulty) = &input.difficulty {
        qb.push(", difficulty = ").push_bind(difficulty.clone());
    }
    if let Some(price) = input.price {
        qb.push(", price = ").push_bind(price);
    }
    if let Some(discount) = input.price_discount {
        qb.push(", price_discount = ").push_bind(discount);
    }
    if let Some(summary) = trimmed(&input.summary) {
        qb.push(", summary = ").push_bind(summary.to_string());
    }
    if let Some(description) = trimmed(&input.description) {
        qb.push(", description = ").push_bind(description.to_string());
    }
    if let Some(cover) = trimmed(&input.image_cover) {
        qb.push(", image_cover = ").push_bind(cover.to_string());
    }
    if let Some(images) = &input.images {
        qb.push(", images = ").push_bind(Json(images.clone()));
    }
    if let Some(dates) = &input.start_dates {
        qb.push(", start_dates = ").push_bind(Json(dates.clone()));
    }

    qb.push(" WHERE guid = ").push_bind(id.to_string());
    qb.push(" RETURNING *");

    let row = qb
        .build()
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No tour found with id {}", id)))?;

    Ok(Tour::from_row(&row)?)
}

/// Delete a tour; its reviews go with it
pub async fn delete_tour(db: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM tours WHERE guid = ?")
        .bind(id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("No tour found with id {}", id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> TourInput {
        TourInput {
            name: Some("The Forest Hiker".to_string()),
            duration: Some(5),
            max_group_size: Some(25),
            difficulty: Some("easy".to_string()),
            price: Some(397.0),
            summary: Some("Breathtaking hike".to_string()),
            image_cover: Some("tour-1-cover.jpg".to_string()),
            ..Default::default()
        }
    }

    fn messages(result: Result<()>) -> Vec<String> {
        match result {
            Err(Error::Validation(errors)) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_complete_input_is_valid() {
        assert!(complete().validate(true).is_ok());
    }

    #[test]
    fn test_missing_required_fields_reported_per_field() {
        let fields = messages(TourInput::default().validate(true));
        for expected in ["name", "duration", "maxGroupSize", "difficulty", "price", "summary", "imageCover"] {
            assert!(fields.contains(&expected.to_string()), "missing {}", expected);
        }
    }

    #[test]
    fn test_partial_update_needs_no_required_fields() {
        let patch = TourInput {
            price: Some(450.0),
            ..Default::default()
        };
        assert!(patch.validate(false).is_ok());
    }

    #[test]
    fn test_derived_fields_rejected() {
        let mut input = complete();
        input.ratings_average = Some(5.0);
        input.ratings_quantity = Some(100);
        let fields = messages(input.validate(true));
        assert_eq!(fields, vec!["ratingsAverage", "ratingsQuantity"]);
    }

    #[test]
    fn test_bad_difficulty_and_discount() {
        let mut input = complete();
        input.difficulty = Some("extreme".to_string());
        input.price_discount = Some(500.0);
        let fields = messages(input.validate(true));
        assert_eq!(fields, vec!["difficulty", "priceDiscount"]);
    }

    #[test]
    fn test_blank_image_name_rejected() {
        let mut input = complete();
        input.images = Some(vec!["tour-1-1.jpg".to_string(), " ".to_string()]);
        assert_eq!(messages(input.validate(true)), vec!["images"]);
    }

    #[test]
    fn test_start_dates_parse_from_iso_strings() {
        let input: TourInput = serde_json::from_str(
            r#"{"images": ["tour-1-1.jpg"], "startDates": ["2027-04-25T09:00:00Z", "2027-07-20T09:00:00Z"]}"#,
        )
        .unwrap();
        assert_eq!(input.images.as_deref(), Some(&["tour-1-1.jpg".to_string()][..]));
        assert_eq!(input.start_dates.as_ref().unwrap().len(), 2);
        assert!(input.validate(false).is_ok());
    }
}
