//! SQL assembly for the paginated queries and the role DDL.
//!
//! Values are always bound (`push_bind`); the only text interpolated into a
//! statement comes from constants here or from an allow-listed
//! [`SortColumn::column`]. Role names in DDL are quoted by the server.

use core_types::{
    AthleteSortKey, CompetitionSortKey, Pagination, ResultSortKey, SortColumn, SortSpec,
};
use sqlx::{Postgres, QueryBuilder};

// Numeric columns are cast so that REAL/NUMERIC storage decodes as f64.
pub(crate) const SELECT_ATHLETES: &str =
    "SELECT id, name, gender::text AS gender, height::float8 AS height FROM Athletes";
pub(crate) const SELECT_SPORTS: &str = "SELECT id, name FROM Sports";
pub(crate) const SELECT_GENDERS: &str = "SELECT id::text AS id, name FROM Gender";
pub(crate) const SELECT_RESULTS: &str =
    "SELECT id, competitionID, sportID, athleteID, result::float8 AS result FROM Results";
pub(crate) const SELECT_COMPETITIONS: &str = "SELECT id, place, held FROM Competitions";

const REPORT_COLUMNS: &str = "SELECT c.place, c.held, s.name AS sport, a.id AS athleteid, \
     a.name, r.result::float8 AS result";
const REPORT_JOINS: &str = " FROM Results r \
     JOIN Competitions c ON r.competitionID = c.id \
     JOIN Sports s ON r.sportID = s.id \
     JOIN Athletes a ON r.athleteID = a.id";

// `format()` templates; `%I` quotes the role name as one identifier.
pub(crate) const SELECT_FORMAT_IDENT: &str = "SELECT format($1, $2::text)";
pub(crate) const CREATE_LOGIN_ROLE: &str = "CREATE ROLE %I WITH LOGIN";
pub(crate) const ROLE_GRANTS: [&str; 2] = [
    "GRANT INSERT ON Competitions TO %I",
    "GRANT SELECT ON Athletes, Results TO %I",
];

/// Appends `ORDER BY`, always ending with `tiebreak` so that consecutive
/// pages never overlap.
pub fn push_order_by<K: SortColumn>(
    builder: &mut QueryBuilder<'_, Postgres>,
    sort: Option<&SortSpec<K>>,
    tiebreak: &'static str,
) {
    builder.push(" ORDER BY ");
    if let Some(sort) = sort {
        builder.push(sort.to_sql()).push(", ");
    }
    builder.push(tiebreak);
}

/// Appends bound `LIMIT` and `OFFSET`.
pub fn push_page(builder: &mut QueryBuilder<'_, Postgres>, pagination: Pagination) {
    builder
        .push(" LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());
}

/// Inclusion filters of the results report. An empty list does not filter.
#[derive(Debug, Clone, Copy)]
pub struct ResultFilter<'a> {
    pub places: &'a [String],
    pub sports: &'a [String],
}

impl ResultFilter<'_> {
    pub fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        let mut separator = " WHERE ";
        if !self.places.is_empty() {
            builder
                .push(separator)
                .push("c.place = ANY(")
                .push_bind(self.places.to_vec())
                .push(")");
            separator = " AND ";
        }
        if !self.sports.is_empty() {
            builder
                .push(separator)
                .push("s.name = ANY(")
                .push_bind(self.sports.to_vec())
                .push(")");
        }
    }
}

pub fn athletes_count() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new("SELECT COUNT(*) FROM Athletes")
}

pub fn athletes_page(
    sort: Option<&SortSpec<AthleteSortKey>>,
    pagination: Pagination,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(SELECT_ATHLETES);
    push_order_by(&mut builder, sort, "id");
    push_page(&mut builder, pagination);
    builder
}

pub fn competitions_count(place: &str) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM Competitions WHERE place = ");
    builder.push_bind(place.to_string());
    builder
}

pub fn competitions_page(
    place: &str,
    sort: Option<&SortSpec<CompetitionSortKey>>,
    pagination: Pagination,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(SELECT_COMPETITIONS);
    builder.push(" WHERE place = ").push_bind(place.to_string());
    push_order_by(&mut builder, sort, "id");
    push_page(&mut builder, pagination);
    builder
}

pub fn report_count(filter: ResultFilter<'_>) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*)");
    builder.push(REPORT_JOINS);
    filter.push_where(&mut builder);
    builder
}

pub fn report_page(
    filter: ResultFilter<'_>,
    sort: Option<&SortSpec<ResultSortKey>>,
    pagination: Pagination,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(REPORT_COLUMNS);
    builder.push(REPORT_JOINS);
    filter.push_where(&mut builder);
    push_order_by(&mut builder, sort, "r.id");
    push_page(&mut builder, pagination);
    builder
}
