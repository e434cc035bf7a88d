use serde::{Deserialize, Serialize};

/// Roles allowed to insert or delete rows.
pub const WRITER_ROLES: [&str; 2] = ["editor", "theone"];

/// The only role allowed to register new users.
pub const ADMIN_ROLE: &str = "theone";

/// Returns `true` if the given role may perform write operations.
pub fn is_writer_role(role: &str) -> bool {
    WRITER_ROLES.contains(&role)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Interprets a caller-supplied order string.
    ///
    /// Only "desc" (in any case) sorts descending; every other value,
    /// including an empty string, sorts ascending.
    pub fn parse_lenient(order: &str) -> Self {
        if order.trim().eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }

    /// The SQL keyword for this order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_desc_sorts_descending() {
        assert_eq!(SortOrder::parse_lenient("desc"), SortOrder::Desc);
        assert_eq!(SortOrder::parse_lenient("DESC"), SortOrder::Desc);
        assert_eq!(SortOrder::parse_lenient(" Desc "), SortOrder::Desc);
        assert_eq!(SortOrder::parse_lenient("asc"), SortOrder::Asc);
        assert_eq!(SortOrder::parse_lenient("sideways"), SortOrder::Asc);
        assert_eq!(SortOrder::parse_lenient(""), SortOrder::Asc);
    }

    #[test]
    fn writer_roles() {
        assert!(is_writer_role("editor"));
        assert!(is_writer_role("theone"));
        assert!(!is_writer_role("viewer"));
        assert!(!is_writer_role("Editor"));
    }
}
