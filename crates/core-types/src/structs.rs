use crate::error::CoreError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row of the `Users` table.
#[derive(Clone, PartialEq, FromRow, Serialize)]
pub struct User {
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hashed: String,
    pub role_name: String,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("password_hashed", &"<redacted>")
            .field("role_name", &self.role_name)
            .finish()
    }
}

/// A row of the `Athletes` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Athlete {
    pub id: i32,
    pub name: String,
    pub gender: String,
    pub height: f64,
}

/// Input for inserting an athlete; the id is generated by the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAthlete {
    pub name: String,
    pub gender: String,
    pub height: f64,
}

impl NewAthlete {
    pub fn new(name: impl Into<String>, gender: impl Into<String>, height: f64) -> Self {
        Self {
            name: name.into(),
            gender: gender.into(),
            height,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "name".to_string(),
                "athlete name must not be empty".to_string(),
            ));
        }
        if self.gender.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "gender".to_string(),
                "athlete gender must not be empty".to_string(),
            ));
        }
        if !self.height.is_finite() || self.height <= 0.0 {
            return Err(CoreError::InvalidInput(
                "height".to_string(),
                format!("expected a positive height, got {}", self.height),
            ));
        }
        Ok(())
    }
}

/// A row of the `Sports` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Sport {
    pub id: i32,
    pub name: String,
}

/// Outcome of removing a sport together with the results recorded for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SportDeletion {
    pub sport_id: i32,
    pub results_removed: u64,
}

/// A row of the `Competitions` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Competition {
    pub id: i32,
    pub place: String,
    pub held: Option<NaiveDate>,
}

/// Input for inserting a competition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompetition {
    pub place: String,
    pub held: Option<NaiveDate>,
}

impl NewCompetition {
    pub fn new(place: impl Into<String>, held: Option<NaiveDate>) -> Self {
        Self {
            place: place.into(),
            held,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.place.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "place".to_string(),
                "competition place must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// A raw row of the `Results` table.
///
/// PostgreSQL folds the unquoted `competitionID` style column names to
/// lower case, which is what the `sqlx` renames match.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: i32,
    #[sqlx(rename = "competitionid")]
    pub competition_id: i32,
    #[sqlx(rename = "sportid")]
    pub sport_id: i32,
    #[sqlx(rename = "athleteid")]
    pub athlete_id: i32,
    pub result: f64,
}

/// A result joined with its competition, sport and athlete.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ResultReport {
    pub place: String,
    pub held: Option<NaiveDate>,
    pub sport: String,
    pub athleteid: i32,
    pub name: String,
    pub result: f64,
}

/// A row of the `Gender` lookup table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Gender {
    pub id: String,
    pub name: String,
}
