use crate::error::DbError;
use configuration::ConnectionConfig;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;

/// Reported to the server as `application_name`.
const APPLICATION_NAME: &str = "podium";

/// Translates the loaded connection section into driver options.
///
/// Built once per gateway so that a reopened connection gets exactly the
/// settings of the first one.
pub fn connect_options(config: &ConnectionConfig) -> PgConnectOptions {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port())
        .database(&config.database)
        .username(&config.user)
        .password(&config.password)
        .application_name(APPLICATION_NAME);

    match &config.schema {
        Some(schema) => options.options([("search_path", format!("{schema},public"))]),
        None => options,
    }
}

/// Opens a single connection to the PostgreSQL database.
///
/// Statements run outside an explicit transaction commit on their own, so
/// reads and single-statement writes need no further setup.
pub async fn open_connection(options: &PgConnectOptions) -> Result<PgConnection, DbError> {
    PgConnection::connect_with(options)
        .await
        .map_err(DbError::Connection)
}
