use crate::auth;
use crate::connection::{connect_options, open_connection};
use crate::error::DbError;
use crate::query::{self, ResultFilter};
use configuration::ConnectionConfig;
use core_types::{
    is_writer_role, resolve_sort, Athlete, AthleteSortKey, CompetitionSortKey, Competition,
    CoreError, Gender, NewAthlete, NewCompetition, Page, Pagination, ResultRecord, ResultReport,
    ResultSortKey, SortBy, Sport, SportDeletion, ADMIN_ROLE,
};
use sqlx::postgres::{PgConnectOptions, PgConnection, Postgres};
use sqlx::{Connection, Transaction};
use std::fmt;
use std::path::Path;

/// The `DbGateway` provides the application-specific interface to the
/// results database. It owns exactly one connection and encapsulates every
/// SQL statement the application runs.
///
/// The connection is held in an `Option`: `close` takes it out and shuts it
/// down, `open` replaces it, and dropping the gateway drops whatever is still
/// held. Methods take `&mut self`, so a gateway is never used concurrently;
/// callers that need parallelism create one gateway per task.
///
/// Failures are logged at `ERROR` by the `instrument` attribute and returned
/// to the caller. `check_user_credentials` is the exception: it logs and
/// answers `None`.
pub struct DbGateway {
    config: ConnectionConfig,
    options: PgConnectOptions,
    connection: Option<PgConnection>,
    bcrypt_cost: u32,
}

impl fmt::Debug for DbGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbGateway")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .finish()
    }
}

impl DbGateway {
    /// Loads `section` (default `postgresql`) of the INI file at `path` and
    /// connects with it.
    pub async fn from_config_file(
        path: impl AsRef<Path>,
        section: Option<&str>,
    ) -> Result<Self, DbError> {
        let config = configuration::load_connection_config(path, section).inspect_err(|e| {
            tracing::error!(error = %e, "Could not load the connection configuration.");
        })?;
        Self::connect(config).await
    }

    /// Connects with an already-loaded configuration. On failure no gateway
    /// (and no connection) exists.
    pub async fn connect(config: ConnectionConfig) -> Result<Self, DbError> {
        let mut gateway = Self::disconnected(config);
        gateway.open().await?;
        Ok(gateway)
    }

    /// A gateway that holds no connection until [`DbGateway::open`] is called.
    pub fn disconnected(config: ConnectionConfig) -> Self {
        let options = connect_options(&config);
        Self {
            config,
            options,
            connection: None,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Sets the bcrypt work factor used by [`DbGateway::add_user`].
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Closes any held connection, then opens a fresh one with the same
    /// connect options.
    pub async fn open(&mut self) -> Result<(), DbError> {
        self.close().await;
        let connection = open_connection(&self.options).await.inspect_err(|e| {
            tracing::error!(
                error = %e,
                connection = %self.config.display_string(),
                "Failed to open a database connection."
            );
        })?;
        self.connection = Some(connection);
        tracing::info!(connection = %self.config.display_string(), "Database connection opened.");
        Ok(())
    }

    /// Closes the held connection. Calling it with nothing open is a no-op.
    pub async fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            match connection.close().await {
                Ok(()) => tracing::info!("Database connection closed."),
                Err(e) => tracing::warn!(error = %e, "Database connection did not close cleanly."),
            }
        }
    }

    fn connection(&mut self) -> Result<&mut PgConnection, DbError> {
        self.connection.as_mut().ok_or(DbError::Closed)
    }

    /// Starts the write pipeline: opens a transaction and authorizes
    /// `username` inside it. Dropping the returned transaction without
    /// committing rolls the write back.
    async fn begin_write(
        &mut self,
        username: &str,
        action: &str,
        allowed: fn(&str) -> bool,
    ) -> Result<Transaction<'_, Postgres>, DbError> {
        let mut tx = self.connection()?.begin().await?;
        auth::authorize(&mut tx, username, action, allowed).await?;
        Ok(tx)
    }

    /// Returns the role of the current database session.
    #[tracing::instrument(skip(self), err)]
    pub async fn get_current_role(&mut self) -> Result<String, DbError> {
        let role = sqlx::query_scalar("SELECT current_user::text")
            .fetch_one(self.connection()?)
            .await?;
        Ok(role)
    }

    /// Checks a user's login information.
    ///
    /// Returns the user's role when the username exists and the password
    /// matches the stored bcrypt hash. Every other outcome, including lookup
    /// failures and an unusable hash, is `None`.
    #[tracing::instrument(skip(self, password))]
    pub async fn check_user_credentials(&mut self, username: &str, password: &str) -> Option<String> {
        let user = match self.connection() {
            Ok(conn) => auth::find_user(conn, username).await.map_err(DbError::from),
            Err(e) => Err(e),
        };

        match user {
            Ok(Some(user)) => match auth::verify_password(password, &user.password_hashed) {
                Ok(true) => Some(user.role_name),
                Ok(false) => {
                    tracing::warn!("Password does not match.");
                    None
                }
                Err(e) => {
                    tracing::error!(error = %e, "Stored password hash could not be verified.");
                    None
                }
            },
            Ok(None) => {
                auth::verify_unknown_user(password);
                tracing::warn!("Unknown username.");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Credential lookup failed.");
                None
            }
        }
    }

    /// Fetches every row of the `Sports` table.
    #[tracing::instrument(skip(self), err)]
    pub async fn retrieve_all_sports(&mut self) -> Result<Vec<Sport>, DbError> {
        let rows = sqlx::query_as::<_, Sport>(query::SELECT_SPORTS)
            .fetch_all(self.connection()?)
            .await?;
        Ok(rows)
    }

    /// Fetches every row of the `Results` table.
    #[tracing::instrument(skip(self), err)]
    pub async fn retrieve_all_results(&mut self) -> Result<Vec<ResultRecord>, DbError> {
        let rows = sqlx::query_as::<_, ResultRecord>(query::SELECT_RESULTS)
            .fetch_all(self.connection()?)
            .await?;
        Ok(rows)
    }

    /// Fetches every row of the `Gender` lookup table.
    #[tracing::instrument(skip(self), err)]
    pub async fn retrieve_all_genders(&mut self) -> Result<Vec<Gender>, DbError> {
        let rows = sqlx::query_as::<_, Gender>(query::SELECT_GENDERS)
            .fetch_all(self.connection()?)
            .await?;
        Ok(rows)
    }

    /// Deletes a sport in one transaction.
    ///
    /// Only writer roles may delete. An unknown sport is `NotFound`. Without
    /// `force`, a sport that still has results is a `Conflict`; with it, the
    /// results are deleted first. Either error leaves the database untouched.
    #[tracing::instrument(skip(self), err)]
    pub async fn delete_sport(
        &mut self,
        username: &str,
        sport: &str,
        force: bool,
    ) -> Result<SportDeletion, DbError> {
        if sport.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "sport".to_string(),
                "sport name must not be empty".to_string(),
            )
            .into());
        }

        let mut tx = self.begin_write(username, "delete sports", is_writer_role).await?;

        let sport_id: i32 = sqlx::query_scalar("SELECT id FROM Sports WHERE name = $1 FOR UPDATE")
            .bind(sport)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("sport '{sport}'")))?;

        if !force {
            let dependents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Results WHERE sportID = $1")
                .bind(sport_id)
                .fetch_one(&mut *tx)
                .await?;
            if dependents > 0 {
                return Err(DbError::Conflict {
                    what: format!("sport '{sport}'"),
                    reason: format!("it has {dependents} associated result(s)"),
                });
            }
        }

        let results_removed = sqlx::query("DELETE FROM Results WHERE sportID = $1")
            .bind(sport_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM Sports WHERE id = $1")
            .bind(sport_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(sport_id, results_removed, "Sport deleted.");
        Ok(SportDeletion {
            sport_id,
            results_removed,
        })
    }

    /// Fetches one page of the `Athletes` table.
    ///
    /// `sort_by.key` must be one of `id`, `name`, `gender`, `height`; the key
    /// is checked before any statement runs. `total` counts every athlete.
    #[tracing::instrument(skip(self), err)]
    pub async fn retrieve_athletes_page(
        &mut self,
        page: u32,
        items_per_page: u32,
        sort_by: Option<&SortBy>,
    ) -> Result<Page<Athlete>, DbError> {
        let pagination = Pagination::new(page, items_per_page)?;
        let sort = resolve_sort::<AthleteSortKey>(sort_by)?;
        let conn = self.connection()?;

        let mut count_query = query::athletes_count();
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&mut *conn)
            .await?;

        let mut rows_query = query::athletes_page(sort.as_ref(), pagination);
        let rows = rows_query
            .build_query_as::<Athlete>()
            .fetch_all(&mut *conn)
            .await?;

        Ok(Page::new(rows, total, pagination))
    }

    /// Inserts an athlete and returns the generated id.
    ///
    /// Only writer roles may insert; an unknown username is rejected the
    /// same way as an insufficient role.
    #[tracing::instrument(skip(self), err)]
    pub async fn add_athlete(&mut self, username: &str, athlete: &NewAthlete) -> Result<i32, DbError> {
        athlete.validate()?;
        let mut tx = self.begin_write(username, "add athletes", is_writer_role).await?;

        let id: i32 = sqlx::query_scalar(
            "INSERT INTO Athletes (name, height, gender) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&athlete.name)
        .bind(athlete.height)
        .bind(&athlete.gender)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(id, "Athlete added.");
        Ok(id)
    }

    /// Inserts an athlete through the database-side `Insert_athlete`
    /// function, which performs its own authorization, and returns the id it
    /// generated.
    #[tracing::instrument(skip(self), err)]
    pub async fn add_athlete_sql_function(
        &mut self,
        username: &str,
        athlete: &NewAthlete,
    ) -> Result<i32, DbError> {
        athlete.validate()?;
        let id: i32 = sqlx::query_scalar("SELECT Insert_athlete($1, $2, $3, $4)::int4")
            .bind(username)
            .bind(&athlete.name)
            .bind(athlete.height)
            .bind(&athlete.gender)
            .fetch_one(self.connection()?)
            .await?;
        tracing::info!(id, "Athlete added through Insert_athlete.");
        Ok(id)
    }

    /// Fetches one page of the competitions held at `place`.
    ///
    /// `sort_by.key` must be one of `id`, `place`, `held`. `total` counts the
    /// competitions at `place`.
    #[tracing::instrument(skip(self), err)]
    pub async fn retrieve_competitions_from_place_page(
        &mut self,
        place: &str,
        page: u32,
        items_per_page: u32,
        sort_by: Option<&SortBy>,
    ) -> Result<Page<Competition>, DbError> {
        let pagination = Pagination::new(page, items_per_page)?;
        let sort = resolve_sort::<CompetitionSortKey>(sort_by)?;
        let conn = self.connection()?;

        let mut count_query = query::competitions_count(place);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&mut *conn)
            .await?;

        let mut rows_query = query::competitions_page(place, sort.as_ref(), pagination);
        let rows = rows_query
            .build_query_as::<Competition>()
            .fetch_all(&mut *conn)
            .await?;

        Ok(Page::new(rows, total, pagination))
    }

    /// Returns every distinct competition place, alphabetically.
    #[tracing::instrument(skip(self), err)]
    pub async fn retrieve_competition_places(&mut self) -> Result<Vec<String>, DbError> {
        let places = sqlx::query_scalar("SELECT DISTINCT place FROM Competitions ORDER BY place")
            .fetch_all(self.connection()?)
            .await?;
        Ok(places)
    }

    /// Inserts a competition and returns the generated id.
    #[tracing::instrument(skip(self), err)]
    pub async fn add_competition(
        &mut self,
        username: &str,
        competition: &NewCompetition,
    ) -> Result<i32, DbError> {
        competition.validate()?;
        let mut tx = self.begin_write(username, "add competitions", is_writer_role).await?;

        let id: i32 = sqlx::query_scalar(
            "INSERT INTO Competitions (place, held) VALUES ($1, $2) RETURNING id",
        )
        .bind(&competition.place)
        .bind(competition.held)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(id, "Competition added.");
        Ok(id)
    }

    /// Fetches one page of results joined with their competition, sport and
    /// athlete.
    ///
    /// A non-empty `places` keeps only results from those places, a non-empty
    /// `sports` only those sports; both together must match. `sort_by.key`
    /// must be one of `place`, `held`, `sport`, `athleteid`, `name`,
    /// `result`. `total` counts every matching result.
    #[tracing::instrument(skip(self), err)]
    pub async fn retrieve_results_from_sports_and_places_page(
        &mut self,
        places: &[String],
        sports: &[String],
        page: u32,
        items_per_page: u32,
        sort_by: Option<&SortBy>,
    ) -> Result<Page<ResultReport>, DbError> {
        let pagination = Pagination::new(page, items_per_page)?;
        let sort = resolve_sort::<ResultSortKey>(sort_by)?;
        let filter = ResultFilter { places, sports };
        let conn = self.connection()?;

        let mut count_query = query::report_count(filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&mut *conn)
            .await?;

        let mut rows_query = query::report_page(filter, sort.as_ref(), pagination);
        let rows = rows_query
            .build_query_as::<ResultReport>()
            .fetch_all(&mut *conn)
            .await?;

        Ok(Page::new(rows, total, pagination))
    }

    /// Registers a new user with a bcrypt-hashed password.
    ///
    /// Only the `theone` role may create users. The matching database login
    /// role is created separately by [`DbGateway::add_database_role`].
    #[tracing::instrument(skip(self, password), err)]
    pub async fn add_user(
        &mut self,
        username: &str,
        new_username: &str,
        password: &str,
        role_name: &str,
    ) -> Result<(), DbError> {
        for (field, value) in [("username", new_username), ("role_name", role_name)] {
            if value.trim().is_empty() {
                return Err(
                    CoreError::InvalidInput(field.to_string(), "must not be empty".to_string()).into(),
                );
            }
        }
        if password.is_empty() {
            return Err(CoreError::InvalidInput(
                "password".to_string(),
                "must not be empty".to_string(),
            )
            .into());
        }

        let password_hashed = auth::hash_password(password, self.bcrypt_cost)?;
        let mut tx = self
            .begin_write(username, "create users", |role| role == ADMIN_ROLE)
            .await?;

        sqlx::query("INSERT INTO Users (username, password_hashed, role_name) VALUES ($1, $2, $3)")
            .bind(new_username)
            .bind(&password_hashed)
            .bind(role_name)
            .execute(&mut *tx)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => DbError::Validation(
                    CoreError::InvalidInput(
                        "username".to_string(),
                        format!("'{new_username}' is already taken"),
                    ),
                ),
                _ => DbError::Query(e),
            })?;

        tx.commit().await?;
        tracing::info!(new_username, role_name, "User added.");
        Ok(())
    }

    /// Creates the database login role `role_name` unless it already exists,
    /// then grants it insert on `Competitions` and select on `Athletes` and
    /// `Results`. Returns `true` when the role was created.
    ///
    /// Only the `theone` role may call this, and the session's own login
    /// needs `CREATEROLE`.
    #[tracing::instrument(skip(self), err)]
    pub async fn add_database_role(&mut self, username: &str, role_name: &str) -> Result<bool, DbError> {
        if role_name.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "role_name".to_string(),
                "must not be empty".to_string(),
            )
            .into());
        }

        let mut tx = self
            .begin_write(username, "create database roles", |role| role == ADMIN_ROLE)
            .await?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_roles WHERE rolname = $1)")
                .bind(role_name)
                .fetch_one(&mut *tx)
                .await?;

        let templates = (!exists)
            .then_some(query::CREATE_LOGIN_ROLE)
            .into_iter()
            .chain(query::ROLE_GRANTS);
        for template in templates {
            let statement: String = sqlx::query_scalar(query::SELECT_FORMAT_IDENT)
                .bind(template)
                .bind(role_name)
                .fetch_one(&mut *tx)
                .await?;
            sqlx::raw_sql(&statement).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        tracing::info!(role_name, created = !exists, "Database role granted.");
        Ok(!exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_gateway() -> DbGateway {
        DbGateway::disconnected(ConnectionConfig::new("localhost", "results", "webapp", "pw"))
    }

    #[tokio::test]
    async fn disconnected_gateway_reports_closed() {
        let mut gateway = offline_gateway();
        assert!(!gateway.is_open());
        assert!(matches!(gateway.retrieve_all_sports().await, Err(DbError::Closed)));
        assert!(matches!(gateway.get_current_role().await, Err(DbError::Closed)));
        assert!(matches!(
            gateway.retrieve_athletes_page(1, 10, None).await,
            Err(DbError::Closed)
        ));
    }

    #[tokio::test]
    async fn bad_sort_key_fails_before_touching_the_database() {
        let mut gateway = offline_gateway();
        let sort = SortBy::new("badcolumn", "asc");

        let err = gateway.retrieve_athletes_page(1, 5, Some(&sort)).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(CoreError::InvalidSortKey { .. })), "{err:?}");

        let err = gateway
            .retrieve_competitions_from_place_page("Boston", 1, 5, Some(&sort))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(CoreError::InvalidSortKey { .. })), "{err:?}");

        let err = gateway
            .retrieve_results_from_sports_and_places_page(&[], &[], 1, 5, Some(&sort))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(CoreError::InvalidSortKey { .. })), "{err:?}");
    }

    #[tokio::test]
    async fn zero_page_is_rejected() {
        let mut gateway = offline_gateway();
        let err = gateway.retrieve_athletes_page(0, 10, None).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(CoreError::InvalidInput(..))), "{err:?}");
    }

    #[tokio::test]
    async fn invalid_inserts_are_rejected_before_authorization() {
        let mut gateway = offline_gateway();
        let err = gateway
            .add_athlete("editor1", &NewAthlete::new("", "F", 170.5))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)), "{err:?}");

        let err = gateway
            .add_competition("editor1", &NewCompetition::new(" ", None))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)), "{err:?}");

        let err = gateway.delete_sport("editor1", "", true).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)), "{err:?}");

        let err = gateway.add_database_role("root", "  ").await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)), "{err:?}");
    }

    #[tokio::test]
    async fn valid_insert_on_closed_gateway_reports_closed() {
        let mut gateway = offline_gateway();
        let err = gateway
            .add_athlete("editor1", &NewAthlete::new("Jane Doe", "F", 170.5))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Closed), "{err:?}");
    }

    #[tokio::test]
    async fn credential_check_swallows_failures() {
        let mut gateway = offline_gateway();
        assert_eq!(gateway.check_user_credentials("alice", "correctpw").await, None);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut gateway = offline_gateway();
        gateway.close().await;
        gateway.close().await;
        assert!(!gateway.is_open());
    }

    #[tokio::test]
    async fn debug_output_hides_password() {
        let gateway = offline_gateway();
        let debug = format!("{gateway:?}");
        assert!(debug.contains("open: false"));
        assert!(!debug.contains("\"pw\""));
    }

    #[tokio::test]
    async fn missing_section_fails_construction() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("database.ini");
        std::fs::write(&path, "[other]\nhost=a\ndatabase=b\nuser=c\npassword=d\n").unwrap();

        let err = DbGateway::from_config_file(&path, None).await.unwrap_err();
        assert!(
            matches!(err, DbError::Configuration(configuration::error::ConfigError::MissingSection { .. })),
            "{err:?}"
        );
    }
}
