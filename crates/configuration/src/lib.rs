use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod ini_format;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use ini_format::LiteralIni;
pub use logging::LogSettings;
pub use settings::{ConnectionConfig, DEFAULT_PORT, DEFAULT_SECTION};

/// Prefix of environment variables that override file values, e.g.
/// `PODIUM_POSTGRESQL__PASSWORD` overrides `password` in `[postgresql]`.
pub const ENV_PREFIX: &str = "PODIUM";

/// Loads the database connection parameters from one section of an INI file.
///
/// This function is the primary entry point for this crate. `section` defaults
/// to [`DEFAULT_SECTION`]. A file without that section is an error, so a
/// gateway is never built from partial settings.
pub fn load_connection_config(
    path: impl AsRef<Path>,
    section: Option<&str>,
) -> Result<ConnectionConfig, ConfigError> {
    let path = path.as_ref();
    let section = section.unwrap_or(DEFAULT_SECTION);

    // The section must come from the file itself; environment overrides only
    // adjust a section that exists.
    let file = config::Config::builder()
        .add_source(config::File::new(&path.to_string_lossy(), LiteralIni))
        .build()?;

    match file.get_table(section) {
        Ok(_) => {}
        Err(config::ConfigError::NotFound(_)) => {
            return Err(ConfigError::MissingSection {
                section: section.to_string(),
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(e.into()),
    }

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let mut connection = builder.get::<ConnectionConfig>(section)?;
    connection.role_name = connection.user.clone();
    connection
        .validate()
        .map_err(|reason| ConfigError::ValidationError(format!("[{section}] {reason}")))?;

    tracing::debug!(section, connection = %connection.display_string(), "Loaded connection settings.");
    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_ini(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("database.ini");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_default_section() {
        let dir = TempDir::new().unwrap();
        let path = write_ini(
            &dir,
            "[postgresql]\nhost=localhost\ndatabase=results\nuser=webapp\npassword=secret\n",
        );

        let cfg = load_connection_config(&path, None).unwrap();
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.database, "results");
        assert_eq!(cfg.user, "webapp");
        assert_eq!(cfg.password, "secret");
        assert_eq!(cfg.role_name, "webapp");
        assert_eq!(cfg.port(), DEFAULT_PORT);
        assert_eq!(cfg.schema, None);
    }

    #[test]
    fn loads_named_section_with_optional_keys() {
        let dir = TempDir::new().unwrap();
        let path = write_ini(
            &dir,
            "[postgresql]\nhost=a\ndatabase=b\nuser=c\npassword=d\n\n\
             [staging]\nhost=staging-db\ndatabase=results\nuser=reader\npassword=pw\nport=6543\nschema=season\n",
        );

        let cfg = load_connection_config(&path, Some("staging")).unwrap();
        assert_eq!(cfg.host, "staging-db");
        assert_eq!(cfg.port(), 6543);
        assert_eq!(cfg.schema.as_deref(), Some("season"));
        assert_eq!(cfg.role_name, "reader");
    }

    #[test]
    fn missing_section_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_ini(&dir, "[other]\nhost=a\ndatabase=b\nuser=c\npassword=d\n");

        let err = load_connection_config(&path, None).unwrap_err();
        match err {
            ConfigError::MissingSection { section, path: reported } => {
                assert_eq!(section, "postgresql");
                assert_eq!(reported, path);
            }
            other => panic!("expected MissingSection, got {other:?}"),
        }
    }

    #[test]
    fn backslash_in_password_is_kept_literally() {
        let dir = TempDir::new().unwrap();
        let path = write_ini(
            &dir,
            "[postgresql]\nhost=a\ndatabase=b\nuser=c\npassword=pa\\nss;x#y\n",
        );

        let cfg = load_connection_config(&path, None).unwrap();
        assert_eq!(cfg.password, "pa\\nss;x#y");
    }

    #[test]
    fn option_names_are_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let path = write_ini(&dir, "[postgresql]\nHOST=h\nDatabase=b\nUSER=c\nPassword=d\n");

        let cfg = load_connection_config(&path, None).unwrap();
        assert_eq!(cfg.host, "h");
        assert_eq!(cfg.user, "c");
    }

    // Each test below uses its own section name, so the variables it sets
    // cannot leak into the other tests' sections.
    #[test]
    fn environment_does_not_invent_a_missing_section() {
        unsafe { std::env::set_var("PODIUM_ENVONLY__HOST", "from-env") };
        let dir = TempDir::new().unwrap();
        let path = write_ini(&dir, "[postgresql]\nhost=a\ndatabase=b\nuser=c\npassword=d\n");

        let err = load_connection_config(&path, Some("envonly")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSection { .. }), "got {err:?}");
    }

    #[test]
    fn environment_overrides_file_values() {
        unsafe { std::env::set_var("PODIUM_OVERRIDDEN__PASSWORD", "from-env") };
        let dir = TempDir::new().unwrap();
        let path = write_ini(&dir, "[overridden]\nhost=a\ndatabase=b\nuser=c\npassword=d\n");

        let cfg = load_connection_config(&path, Some("overridden")).unwrap();
        assert_eq!(cfg.password, "from-env");
        assert_eq!(cfg.host, "a");
    }

    #[test]
    fn missing_key_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let path = write_ini(&dir, "[postgresql]\nhost=a\ndatabase=b\nuser=c\n");

        let err = load_connection_config(&path, None).unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)), "got {err:?}");
    }

    #[test]
    fn blank_host_fails_validation() {
        let dir = TempDir::new().unwrap();
        let path = write_ini(&dir, "[postgresql]\nhost=\ndatabase=b\nuser=c\npassword=d\n");

        let err = load_connection_config(&path, None).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)), "got {err:?}");
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let err = load_connection_config(dir.path().join("absent.ini"), None).unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)), "got {err:?}");
    }
}
