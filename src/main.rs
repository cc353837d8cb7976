use clap::{Parser, Subcommand};

mod commands;

use commands::{AccountCommand, DocCommand, GroupCommand};
use docshare::client::ApiClient;

#[derive(Parser)]
#[command(name = "docshare")]
#[command(version)]
#[command(about = "Command line client for a docshare server", long_about = None)]
struct Cli {
    /// Server URL
    #[arg(long, global = true, env = "DOCSHARE_SERVER", default_value = "http://localhost:8080")]
    server: String,

    /// Session token from `docshare login`
    #[arg(long, global = true, env = "DOCSHARE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Account(AccountCommand),

    /// Manage documents
    Doc(DocCommand),

    /// Manage groups
    Group(GroupCommand),
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
    let client = ApiClient::new(cli.server, cli.token);

    match cli.command {
        Some(Commands::Account(cmd)) => cmd.run(&client).await?,
        Some(Commands::Doc(cmd)) => cmd.run(&client).await?,
        Some(Commands::Group(cmd)) => cmd.run(&client).await?,
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
