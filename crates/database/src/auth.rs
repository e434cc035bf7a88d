//! Password verification and role checks for the gateway.

use crate::error::DbError;
use core_types::User;
use sqlx::postgres::PgConnection;
use std::sync::LazyLock;

// Stands in for the stored hash of a username that does not exist, at the
// cost new hashes are written with.
static UNKNOWN_USER_HASH: LazyLock<Result<String, bcrypt::BcryptError>> =
    LazyLock::new(|| bcrypt::hash("podium-unknown-user", bcrypt::DEFAULT_COST));

/// Checks `password` against a stored bcrypt hash.
///
/// The comparison inside `bcrypt::verify` is constant-time. A malformed
/// hash is reported as an error rather than a mismatch.
pub fn verify_password(password: &str, password_hashed: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(password, password_hashed)
}

/// Runs the same bcrypt verification a known user would get, against a hash
/// no password matches, so a miss on the username costs as much as a miss on
/// the password. Always `false`.
pub(crate) fn verify_unknown_user(password: &str) -> bool {
    if let Ok(hash) = UNKNOWN_USER_HASH.as_ref() {
        let _ = bcrypt::verify(password, hash);
    }
    false
}

/// Produces a bcrypt hash suitable for the `Users.password_hashed` column.
pub fn hash_password(password: &str, cost: u32) -> Result<String, DbError> {
    Ok(bcrypt::hash(password, cost)?)
}

/// Looks up a user by exact username.
pub(crate) async fn find_user(
    conn: &mut PgConnection,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT username, password_hashed, role_name FROM Users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(conn)
    .await
}

/// Resolves the caller's role and checks it with `allowed`.
///
/// Must run inside the write transaction: the user row is share-locked, so
/// the role cannot change between this check and the commit.
pub(crate) async fn authorize(
    conn: &mut PgConnection,
    username: &str,
    action: &str,
    allowed: fn(&str) -> bool,
) -> Result<String, DbError> {
    let role: Option<String> =
        sqlx::query_scalar("SELECT role_name FROM Users WHERE username = $1 FOR SHARE")
            .bind(username)
            .fetch_optional(conn)
            .await?;

    let Some(role) = role else {
        return Err(DbError::Authorization {
            username: username.to_string(),
            reason: "username not found".to_string(),
        });
    };

    if !allowed(&role) {
        return Err(DbError::Authorization {
            username: username.to_string(),
            reason: format!("role '{role}' does not have permission to {action}"),
        });
    }

    tracing::debug!(username, role = %role, action, "Write authorized.");
    Ok(role)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Lowest cost bcrypt accepts; keeps the tests fast.
    const TEST_COST: u32 = 4;

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("correctpw", TEST_COST).unwrap();
        assert!(hash.starts_with("$2"));
        assert!(verify_password("correctpw", &hash).unwrap());
        assert!(!verify_password("wrongpw", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("correctpw", "not-a-bcrypt-hash").is_err());
    }

    #[test]
    fn unknown_user_verification_runs_bcrypt_at_default_cost() {
        let hash = UNKNOWN_USER_HASH.as_ref().unwrap();
        assert!(hash.starts_with(&format!("$2b${}$", bcrypt::DEFAULT_COST)), "{hash}");
        assert!(!verify_unknown_user("podium-unknown-user-guess"));
        assert!(!verify_unknown_user(""));
    }

    #[test]
    fn accepts_2b_prefixed_hashes() {
        // Hashes written by other bcrypt implementations use the $2b$ prefix.
        let hash = bcrypt::hash_with_result("correctpw", TEST_COST)
            .unwrap()
            .format_for_version(bcrypt::Version::TwoB);
        assert!(hash.starts_with("$2b$"));
        assert!(verify_password("correctpw", &hash).unwrap());
    }
}
