use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use tablesmith::catalog::ColumnDefinition;
use tablesmith::connection::{self, create_pool, ConnectionConfig};
use tablesmith::engine::Engine;
use tablesmith::sql::join::JoinSpecification;

/// Schema and row operations against PostgreSQL through the translation engine
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Use a saved connection profile by name
    #[arg(long = "connect")]
    connect: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List table names
    Tables,
    /// Show a table's columns and rows
    Show { table: String },
    /// Create a table from a free-form label and a JSON column list
    CreateTable {
        label: String,
        /// e.g. '[{"name": "price", "type": "Integer"}]'
        #[arg(long, default_value = "[]")]
        columns: String,
    },
    /// Drop a table (refused while foreign keys reference it)
    DropTable { table: String },
    /// Add a column described as JSON
    AddColumn { table: String, column: String },
    /// Insert a row from a JSON object
    Insert { table: String, data: String },
    /// Update a row by id from a JSON object (partial: only supplied columns change)
    Update { table: String, id: i64, data: String },
    /// Inner-join two tables on an equality key pair
    Join {
        left_table: String,
        right_table: String,
        left_key: String,
        right_key: String,
    },
    /// Save a connection profile for later --connect use
    SaveConnection {
        name: String,
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long, default_value_t = 5432)]
        port: u16,
        #[arg(long, default_value = "postgres")]
        database: String,
        #[arg(long, default_value = "postgres")]
        username: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if let Command::SaveConnection {
        name,
        host,
        port,
        database,
        username,
    } = &cli.command
    {
        let mut profiles = connection::load_saved_connections().unwrap_or_default();
        profiles.retain(|c| !c.name.eq_ignore_ascii_case(name));
        profiles.push(ConnectionConfig {
            name: name.clone(),
            host: host.clone(),
            port: *port,
            database: database.clone(),
            username: username.clone(),
            ..Default::default()
        });
        connection::save_connections(&profiles)?;
        eprintln!("Saved connection {:?}", name);
        return Ok(());
    }

    let config = resolve_config(cli.connect.as_deref())?;
    let pool = create_pool(&config)?;
    let engine = Engine::new(pool);

    match cli.command {
        Command::Tables => print_json(&engine.list_tables().await?),
        Command::Show { table } => print_json(&engine.get_table(&table).await?),
        Command::CreateTable { label, columns } => {
            let columns: Vec<ColumnDefinition> = serde_json::from_str(&columns)?;
            print_json(&engine.create_table(&label, &columns).await?)
        }
        Command::DropTable { table } => {
            engine.drop_table(&table).await?;
            eprintln!("Dropped table {:?}", table);
            Ok(())
        }
        Command::AddColumn { table, column } => {
            let column: ColumnDefinition = serde_json::from_str(&column)?;
            print_json(&engine.add_column(&table, &column).await?)
        }
        Command::Insert { table, data } => {
            let data = parse_object(&data)?;
            print_json(&engine.insert_row(&table, &data).await?)
        }
        Command::Update { table, id, data } => {
            let data = parse_object(&data)?;
            print_json(&engine.update_row(&table, id, &data).await?)
        }
        Command::Join {
            left_table,
            right_table,
            left_key,
            right_key,
        } => {
            let spec = JoinSpecification {
                left_table,
                right_table,
                left_key,
                right_key,
            };
            print_json(&engine.run_join(&spec).await?)
        }
        Command::SaveConnection { .. } => unreachable!("handled above"),
    }
}

fn resolve_config(profile: Option<&str>) -> Result<ConnectionConfig> {
    let mut config = match profile {
        Some(name) => {
            let saved = connection::load_saved_connections().unwrap_or_default();
            match saved
                .into_iter()
                .find(|c| c.name.eq_ignore_ascii_case(name))
            {
                Some(c) => c,
                None => {
                    eprintln!("Error: no saved connection named {:?}", name);
                    eprintln!("Saved connections:");
                    for c in connection::load_saved_connections().unwrap_or_default() {
                        eprintln!("  - {}", c.name);
                    }
                    std::process::exit(1);
                }
            }
        }
        None => ConnectionConfig::default(),
    };

    if config.password.is_empty() {
        match std::env::var("PGPASSWORD") {
            Ok(pw) => config.password = pw,
            Err(_) => bail!(
                "no password for {}; set PGPASSWORD",
                config.display_string()
            ),
        }
    }
    Ok(config)
}

fn parse_object(raw: &str) -> Result<serde_json::Map<String, serde_json::Value>> {
    match serde_json::from_str(raw)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => bail!("expected a JSON object, got: {raw}"),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
