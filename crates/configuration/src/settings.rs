use serde::Deserialize;
use std::fmt;

/// Section read when the caller does not name one.
pub const DEFAULT_SECTION: &str = "postgresql";

/// PostgreSQL's default port, used when the section has no `port` key.
pub const DEFAULT_PORT: u16 = 5432;

/// Connection parameters for the database, deserialized from one section of
/// the connection file:
///
/// ```ini
/// [postgresql]
/// host=localhost
/// database=results
/// user=webapp
/// password=secret
/// ```
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Optional TCP port; defaults to 5432.
    #[serde(default)]
    pub port: Option<u16>,
    /// Optional schema placed first on the session's `search_path`.
    #[serde(default)]
    pub schema: Option<String>,
    /// The login role the gateway acts as. Always equal to `user`.
    #[serde(skip)]
    pub role_name: String,
}

impl ConnectionConfig {
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let user = user.into();
        Self {
            host: host.into(),
            database: database.into(),
            role_name: user.clone(),
            user,
            password: password.into(),
            port: None,
            schema: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Libpq-style keyword/value connection string with the password masked.
    /// Suitable for log lines.
    pub fn display_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password=***",
            self.host,
            self.port(),
            self.database,
            self.user
        )
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("host", &self.host),
            ("database", &self.database),
            ("user", &self.user),
        ] {
            if value.trim().is_empty() {
                return Err(format!("`{field}` must not be empty"));
            }
        }
        if let Some(schema) = &self.schema {
            if schema.trim().is_empty() {
                return Err("`schema` must not be empty when present".to_string());
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port())
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("schema", &self.schema)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_name_follows_user() {
        let cfg = ConnectionConfig::new("localhost", "results", "webapp", "pw");
        assert_eq!(cfg.role_name, "webapp");
        assert_eq!(cfg.port(), DEFAULT_PORT);
    }

    #[test]
    fn debug_and_display_mask_password() {
        let cfg = ConnectionConfig::new("db", "results", "webapp", "hunter2").with_port(6543);
        assert!(!format!("{cfg:?}").contains("hunter2"));
        assert_eq!(
            cfg.display_string(),
            "host=db port=6543 dbname=results user=webapp password=***"
        );
    }

    #[test]
    fn blank_required_fields_fail_validation() {
        let cfg = ConnectionConfig::new("", "results", "webapp", "pw");
        assert!(cfg.validate().unwrap_err().contains("host"));
        let cfg = ConnectionConfig::new("db", "results", "webapp", "pw").with_schema(" ");
        assert!(cfg.validate().is_err());
    }
}
