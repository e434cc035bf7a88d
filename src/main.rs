use anyhow::{Context, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use configuration::LogSettings;
use core_types::{NewAthlete, NewCompetition, Page, SortBy};
use database::DbGateway;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

/// The main entry point for the Podium results CLI.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional .env file (e.g. PODIUM_CONFIG, RUST_LOG, PODIUM_POSTGRESQL__PASSWORD).
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();
    let _log_guard = configuration::logging::init(&cli.logging)?;

    let mut gateway = DbGateway::from_config_file(&cli.config, cli.section.as_deref())
        .await
        .with_context(|| format!("could not open the database using {}", cli.config.display()))?;

    // Execute the appropriate command, then release the connection whatever the outcome.
    let outcome = run(&mut gateway, cli.command, cli.json).await;
    gateway.close().await;
    outcome
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Query and maintain the sports results database.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// INI file with the database connection section.
    #[arg(long, short, env = "PODIUM_CONFIG", default_value = "database.ini", global = true)]
    config: PathBuf,

    /// Section of the connection file to use (default: postgresql).
    #[arg(long, global = true)]
    section: Option<String>,

    /// Print rows as JSON instead of a table.
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    logging: LogSettings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the database role of the current session.
    Whoami,
    /// Check a user's password and print their role.
    Login {
        username: String,
        #[arg(long, env = "PODIUM_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// List all sports.
    Sports,
    /// List all genders.
    Genders,
    /// List every raw result row.
    Results,
    /// List athletes, one page at a time.
    Athletes(PageArgs),
    /// List the distinct competition places.
    Places,
    /// List the competitions held at one place.
    Competitions {
        #[arg(long)]
        place: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Results joined with competition, sport and athlete.
    Report {
        /// Only include these places (repeatable).
        #[arg(long = "place")]
        places: Vec<String>,
        /// Only include these sports (repeatable).
        #[arg(long = "sport")]
        sports: Vec<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Add an athlete on behalf of a user.
    AddAthlete {
        /// The user performing the insert.
        #[arg(long)]
        user: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        gender: String,
        #[arg(long)]
        height: f64,
        /// Insert through the database's Insert_athlete function.
        #[arg(long)]
        via_function: bool,
    },
    /// Add a competition on behalf of a user.
    AddCompetition {
        #[arg(long)]
        user: String,
        #[arg(long)]
        place: String,
        /// Date the competition is held (format: YYYY-MM-DD).
        #[arg(long)]
        held: Option<NaiveDate>,
    },
    /// Delete a sport; refused while it has results unless --force is given.
    DeleteSport {
        #[arg(long)]
        user: String,
        sport: String,
        /// Also delete the sport's results.
        #[arg(long)]
        force: bool,
    },
    /// Register a new user.
    AddUser {
        #[arg(long)]
        user: String,
        username: String,
        #[arg(long)]
        role: String,
        #[arg(long, env = "PODIUM_NEW_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create a login role in the database with the application grants.
    AddDbRole {
        #[arg(long)]
        user: String,
        role: String,
    },
}

#[derive(Args)]
struct PageArgs {
    /// Page number, starting at 1.
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value_t = 10)]
    per_page: u32,
    /// Column to sort by.
    #[arg(long)]
    sort: Option<String>,
    /// "asc" or "desc".
    #[arg(long, default_value = "asc")]
    order: String,
}

impl PageArgs {
    fn sort_by(&self) -> Option<SortBy> {
        self.sort.as_ref().map(|key| SortBy::new(key.clone(), self.order.clone()))
    }
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn run(gateway: &mut DbGateway, command: Commands, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Whoami => println!("{}", gateway.get_current_role().await?),
        Commands::Login { username, password } => {
            match gateway.check_user_credentials(&username, &password).await {
                Some(role) => println!("{role}"),
                None => bail!("access denied for '{username}'"),
            }
        }
        Commands::Sports => print_rows(&gateway.retrieve_all_sports().await?, json)?,
        Commands::Genders => print_rows(&gateway.retrieve_all_genders().await?, json)?,
        Commands::Results => print_rows(&gateway.retrieve_all_results().await?, json)?,
        Commands::Athletes(args) => {
            let sort = args.sort_by();
            let page = gateway
                .retrieve_athletes_page(args.page, args.per_page, sort.as_ref())
                .await?;
            print_page(&page, json)?;
        }
        Commands::Places => print_rows(&gateway.retrieve_competition_places().await?, json)?,
        Commands::Competitions { place, page: args } => {
            let sort = args.sort_by();
            let page = gateway
                .retrieve_competitions_from_place_page(&place, args.page, args.per_page, sort.as_ref())
                .await?;
            print_page(&page, json)?;
        }
        Commands::Report {
            places,
            sports,
            page: args,
        } => {
            let sort = args.sort_by();
            let page = gateway
                .retrieve_results_from_sports_and_places_page(
                    &places,
                    &sports,
                    args.page,
                    args.per_page,
                    sort.as_ref(),
                )
                .await?;
            print_page(&page, json)?;
        }
        Commands::AddAthlete {
            user,
            name,
            gender,
            height,
            via_function,
        } => {
            let athlete = NewAthlete::new(name, gender, height);
            let id = if via_function {
                gateway.add_athlete_sql_function(&user, &athlete).await?
            } else {
                gateway.add_athlete(&user, &athlete).await?
            };
            println!("Added athlete {id}.");
        }
        Commands::AddCompetition { user, place, held } => {
            let id = gateway
                .add_competition(&user, &NewCompetition::new(place, held))
                .await?;
            println!("Added competition {id}.");
        }
        Commands::DeleteSport { user, sport, force } => {
            let deletion = gateway.delete_sport(&user, &sport, force).await?;
            println!(
                "Deleted sport '{sport}' (id {}) and {} result(s).",
                deletion.sport_id, deletion.results_removed
            );
        }
        Commands::AddUser {
            user,
            username,
            role,
            password,
        } => {
            gateway.add_user(&user, &username, &password, &role).await?;
            println!("Added user '{username}' with role '{role}'.");
        }
        Commands::AddDbRole { user, role } => {
            if gateway.add_database_role(&user, &role).await? {
                println!("Created database role '{role}'.");
            } else {
                println!("Database role '{role}' already existed; grants refreshed.");
            }
        }
    }
    Ok(())
}

// ==============================================================================
// Output
// ==============================================================================

fn print_page<T: Serialize>(page: &Page<T>, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(page)?);
        return Ok(());
    }
    println!("{}", render_table(&page.rows)?);
    println!(
        "Page {} of {} ({} row(s) in total)",
        page.page,
        page.total_pages(),
        page.total
    );
    Ok(())
}

fn print_rows<T: Serialize>(rows: &[T], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
    } else {
        println!("{}", render_table(rows)?);
    }
    Ok(())
}

/// Renders rows as a table whose header is the serialized field names.
fn render_table<T: Serialize>(rows: &[T]) -> anyhow::Result<Table> {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let values: Vec<Value> = rows
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()?;

    if let Some(Value::Object(first)) = values.first() {
        table.set_header(first.keys());
    }
    for value in values {
        match value {
            Value::Object(fields) => table.add_row(fields.values().map(cell)),
            scalar => table.add_row(vec![cell(&scalar)]),
        };
    }
    Ok(table)
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{Pagination, Sport};

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_report_filters() {
        let cli = Cli::try_parse_from([
            "podium", "report", "--place", "Boston", "--place", "Oslo", "--sport", "Marathon",
            "--sort", "result", "--order", "desc",
        ])
        .unwrap();
        match cli.command {
            Commands::Report { places, sports, page } => {
                assert_eq!(places, ["Boston", "Oslo"]);
                assert_eq!(sports, ["Marathon"]);
                assert_eq!(page.sort_by(), Some(SortBy::new("result", "desc")));
                assert_eq!((page.page, page.per_page), (1, 10));
            }
            _ => panic!("expected the report command"),
        }
    }

    #[test]
    fn parses_competition_date() {
        let cli = Cli::try_parse_from([
            "podium", "add-competition", "--user", "editor1", "--place", "Boston", "--held",
            "2025-04-21",
        ])
        .unwrap();
        match cli.command {
            Commands::AddCompetition { held, .. } => {
                assert_eq!(held, NaiveDate::from_ymd_opt(2025, 4, 21));
            }
            _ => panic!("expected the add-competition command"),
        }
    }

    #[test]
    fn delete_sport_is_not_forced_by_default() {
        let cli = Cli::try_parse_from(["podium", "delete-sport", "--user", "editor1", "Marathon"]).unwrap();
        assert!(matches!(cli.command, Commands::DeleteSport { force: false, .. }));

        let cli = Cli::try_parse_from([
            "podium", "delete-sport", "--user", "editor1", "Marathon", "--force",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::DeleteSport { force: true, .. }));
    }

    #[test]
    fn table_uses_field_names_as_header() {
        let rows = vec![
            Sport { id: 1, name: "Marathon".to_string() },
            Sport { id: 2, name: "High Jump".to_string() },
        ];
        let rendered = render_table(&rows).unwrap().to_string();
        assert!(rendered.contains("id"));
        assert!(rendered.contains("name"));
        assert!(rendered.contains("High Jump"));
    }

    #[test]
    fn page_json_includes_total() {
        let page = Page::new(
            vec!["Boston".to_string()],
            3,
            Pagination::new(1, 1).unwrap(),
        );
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["total"], 3);
        assert_eq!(value["rows"][0], "Boston");
    }

    #[test]
    fn null_cells_are_blank() {
        assert_eq!(cell(&Value::Null), "");
        assert_eq!(cell(&Value::String("Oslo".into())), "Oslo");
        assert_eq!(cell(&serde_json::json!(1.85)), "1.85");
    }
}
