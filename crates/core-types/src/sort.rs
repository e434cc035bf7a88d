use crate::enums::SortOrder;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};

/// A table whose rows can be ordered by an allow-listed set of columns.
///
/// Only the `&'static str` returned by [`SortColumn::column`] is ever
/// interpolated into SQL, so a key that fails [`SortColumn::from_key`]
/// never reaches the database.
pub trait SortColumn: Copy + Sized {
    /// Table name used in validation messages.
    const TABLE: &'static str;

    fn from_key(key: &str) -> Option<Self>;

    fn column(&self) -> &'static str;
}

/// Sort request as supplied by a caller, e.g. `{"key": "name", "order": "desc"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortBy {
    pub key: String,
    #[serde(default)]
    pub order: String,
}

impl SortBy {
    pub fn new(key: impl Into<String>, order: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            order: order.into(),
        }
    }

    /// Validates the key against the allow-list of `K`.
    pub fn resolve<K: SortColumn>(&self) -> Result<SortSpec<K>, CoreError> {
        let key = K::from_key(&self.key).ok_or_else(|| CoreError::InvalidSortKey {
            table: K::TABLE,
            key: self.key.clone(),
        })?;
        Ok(SortSpec {
            key,
            order: SortOrder::parse_lenient(&self.order),
        })
    }
}

/// A validated sort specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec<K> {
    pub key: K,
    pub order: SortOrder,
}

impl<K: SortColumn> SortSpec<K> {
    /// Renders `<column> ASC|DESC`.
    pub fn to_sql(&self) -> String {
        format!("{} {}", self.key.column(), self.order.as_sql())
    }
}

/// Resolves an optional caller sort request.
pub fn resolve_sort<K: SortColumn>(sort_by: Option<&SortBy>) -> Result<Option<SortSpec<K>>, CoreError> {
    sort_by.map(SortBy::resolve::<K>).transpose()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AthleteSortKey {
    Id,
    Name,
    Gender,
    Height,
}

impl SortColumn for AthleteSortKey {
    const TABLE: &'static str = "Athletes";

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "id" => Some(Self::Id),
            "name" => Some(Self::Name),
            "gender" => Some(Self::Gender),
            "height" => Some(Self::Height),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Gender => "gender",
            Self::Height => "height",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompetitionSortKey {
    Id,
    Place,
    Held,
}

impl SortColumn for CompetitionSortKey {
    const TABLE: &'static str = "Competitions";

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "id" => Some(Self::Id),
            "place" => Some(Self::Place),
            "held" => Some(Self::Held),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Place => "place",
            Self::Held => "held",
        }
    }
}

/// Sort keys of the joined results report. Columns are qualified with the
/// aliases used by the report query (`r`, `c`, `s`, `a`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSortKey {
    Place,
    Held,
    Sport,
    AthleteId,
    Name,
    Result,
}

impl SortColumn for ResultSortKey {
    const TABLE: &'static str = "Results";

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "place" => Some(Self::Place),
            "held" => Some(Self::Held),
            "sport" => Some(Self::Sport),
            "athleteid" => Some(Self::AthleteId),
            "name" => Some(Self::Name),
            "result" => Some(Self::Result),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Self::Place => "c.place",
            Self::Held => "c.held",
            Self::Sport => "s.name",
            Self::AthleteId => "a.id",
            Self::Name => "a.name",
            Self::Result => "r.result",
        }
    }
}
