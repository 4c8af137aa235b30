//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

/// Default `ratingsAverage` for a tour with no reviews
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "guide" => Ok(Role::Guide),
            "lead-guide" => Ok(Role::LeadGuide),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "difficult" => Ok(Difficulty::Difficult),
            other => Err(format!("Unknown difficulty: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: String,
    pub name: String,
    pub duration: i64,
    pub max_group_size: i64,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i64,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tour {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let difficulty: String = row.try_get("difficulty")?;
        Ok(Self {
            id: row.try_get("guid")?,
            name: row.try_get("name")?,
            duration: row.try_get("duration")?,
            max_group_size: row.try_get("max_group_size")?,
            difficulty: difficulty.parse().map_err(|e: String| sqlx::Error::Decode(e.into()))?,
            ratings_average: row.try_get("ratings_average")?,
            ratings_quantity: row.try_get("ratings_quantity")?,
            price: row.try_get("price")?,
            price_discount: row.try_get("price_discount")?,
            summary: row.try_get("summary")?,
            description: row.try_get("description")?,
            image_cover: row.try_get("image_cover")?,
            images: row.try_get::<Json<Vec<String>>, _>("images")?.0,
            start_dates: row.try_get::<Json<Vec<DateTime<Utc>>>, _>("start_dates")?.0,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub review: String,
    pub rating: i64,
    pub tour_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("guid")?,
            review: row.try_get("review")?,
            rating: row.try_get("rating")?,
            tour_id: row.try_get("tour_id")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub photo: Option<String>,
    #[serde(skip)]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        Ok(Self {
            id: row.try_get("guid")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            role: role.parse().map_err(|e: String| sqlx::Error::Decode(e.into()))?,
            photo: row.try_get("photo")?,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::User, Role::Guide, Role::LeadGuide, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serializes_kebab_case() {
        assert_eq!(serde_json::to_value(Role::LeadGuide).unwrap(), "lead-guide");
    }

    #[test]
    fn test_review_serializes_camel_case() {
        let review = Review {
            id: "r1".to_string(),
            review: "Great".to_string(),
            rating: 5,
            tour_id: "t1".to_string(),
            user_id: "u1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&review).unwrap();
        assert_eq!(value["tourId"], "t1");
        assert_eq!(value["userId"], "u1");
        assert!(value.get("tour_id").is_none());
    }
}
