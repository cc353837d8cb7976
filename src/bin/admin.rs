//! docshare admin CLI
//!
//! Works directly on the server's SQLite database.
//!
//! # Usage
//!
//! ```bash
//! docshare-admin user add ann --password s3cret
//! docshare-admin user list
//! docshare-admin reset --force
//! ```

use chrono::TimeDelta;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use docshare::auth::TokenIssuer;
use docshare::config::Config;
use docshare::service::UserService;
use docshare::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "docshare-admin")]
#[command(version)]
#[command(about = "docshare server administration tool")]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true, env = "DOCSHARE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users
    User(UserCommand),

    /// Delete every user, document and group and restart all ids
    Reset {
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

#[derive(Args)]
struct UserCommand {
    #[command(subcommand)]
    command: UserSubcommand,
}

#[derive(Subcommand)]
enum UserSubcommand {
    /// Add a new user
    Add {
        login: String,
        #[arg(long, env = "DOCSHARE_PASSWORD")]
        password: String,
    },
    /// List all users
    List,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(cli.config)?;
    let store = Arc::new(SqliteStore::open(&config.database_path).await?);

    match cli.command {
        Commands::User(cmd) => match cmd.command {
            UserSubcommand::Add { login, password } => {
                // Registration never issues a token.
                let tokens = TokenIssuer::new(&config.jwt_secret, TimeDelta::hours(1));
                let users = UserService::new(store, tokens);
                let user = users.register(&login, &password).await?;
                println!("Added user: {}", user.login);
                println!("  Id: {}", user.id);
            }
            UserSubcommand::List => {
                let users = store.list_users().await?;
                if users.is_empty() {
                    println!("No users found");
                    return Ok(());
                }
                println!("{:<8}  {:<30}  CREATED", "ID", "LOGIN");
                println!("{}", "-".repeat(60));
                for user in &users {
                    println!(
                        "{:<8}  {:<30}  {}",
                        user.id,
                        user.login,
                        user.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
                println!("\nTotal: {} user(s)", users.len());
            }
        },
        Commands::Reset { force } => {
            if !force && !confirm(&format!(
                "Delete everything in {}? [y/N] ",
                config.database_path.display()
            ))? {
                println!("Cancelled");
                return Ok(());
            }
            store.reset().await?;
            println!("Database reset");
        }
    }

    Ok(())
}

fn confirm(prompt: &str) -> std::io::Result<bool> {
    use std::io::Write;

    print!("{}", prompt);
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
