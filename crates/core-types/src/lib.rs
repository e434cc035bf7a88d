pub mod enums;
pub mod error;
pub mod pagination;
pub mod sort;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{is_writer_role, SortOrder, ADMIN_ROLE, WRITER_ROLES};
pub use error::CoreError;
pub use pagination::{Page, Pagination};
pub use sort::{
    resolve_sort, AthleteSortKey, CompetitionSortKey, ResultSortKey, SortBy, SortColumn, SortSpec,
};
pub use structs::{
    Athlete, Competition, Gender, NewAthlete, NewCompetition, ResultRecord, ResultReport, Sport,
    SportDeletion, User,
};
