use clap::Subcommand;

use docshare::client::ApiClient;

#[derive(Subcommand)]
pub enum AccountCommand {
    /// Create an account
    Register {
        login: String,
        #[arg(long, env = "DOCSHARE_PASSWORD")]
        password: String,
    },

    /// Log in and print a session token
    Login {
        login: String,
        #[arg(long, env = "DOCSHARE_PASSWORD")]
        password: String,
    },

    /// Show the logged in user
    Whoami,

    /// Change your login
    Rename { login: String },
}

impl AccountCommand {
    pub async fn run(&self, client: &ApiClient) -> Result<(), Box<dyn std::error::Error>> {
        match self {
            AccountCommand::Register { login, password } => {
                let user = client.register(login, password).await?;
                println!("Registered {} (id {})", user.login, user.id);
            }
            AccountCommand::Login { login, password } => {
                let response = client.login(login, password).await?;
                eprintln!("Logged in as {} (id {})", response.user.login, response.user.id);
                println!("{}", response.token);
            }
            AccountCommand::Whoami => {
                let user = client.me().await?;
                println!("{} (id {}, since {})", user.login, user.id, user.created_at.format("%Y-%m-%d"));
            }
            AccountCommand::Rename { login } => {
                let user = client.rename_me(login).await?;
                println!("Login changed to {}", user.login);
            }
        }
        Ok(())
    }
}
