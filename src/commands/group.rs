use clap::{Args, Subcommand};

use super::OutputFormat;
use docshare::client::ApiClient;
use docshare::models::{GroupId, UserId};

#[derive(Args)]
pub struct GroupCommand {
    #[command(subcommand)]
    pub command: GroupSubcommand,
}

#[derive(Subcommand)]
pub enum GroupSubcommand {
    /// Create a group
    Create { name: String },

    /// Rename a group
    Rename { id: GroupId, name: String },

    /// Delete a group
    Delete { id: GroupId },

    /// Add a user to a group
    AddMember { id: GroupId, member: UserId },

    /// Remove a user from a group
    RemoveMember { id: GroupId, member: UserId },

    /// List members of a group
    Members {
        id: GroupId,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        #[arg(long, default_value_t = 50)]
        limit: usize,

        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl GroupCommand {
    pub async fn run(&self, client: &ApiClient) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            GroupSubcommand::Create { name } => {
                let group = client.create_group(name).await?;
                println!("Created group {} (id {})", group.name, group.id);
            }
            GroupSubcommand::Rename { id, name } => {
                let group = client.rename_group(*id, name).await?;
                println!("Renamed group {} to {}", group.id, group.name);
            }
            GroupSubcommand::Delete { id } => {
                client.delete_group(*id).await?;
                println!("Deleted group {}", id);
            }
            GroupSubcommand::AddMember { id, member } => {
                client.add_member(*id, *member).await?;
                println!("Added user {} to group {}", member, id);
            }
            GroupSubcommand::RemoveMember { id, member } => {
                client.remove_member(*id, *member).await?;
                println!("Removed user {} from group {}", member, id);
            }
            GroupSubcommand::Members {
                id,
                offset,
                limit,
                format,
            } => {
                let members = client.members(*id, *offset, *limit).await?;
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&members)?),
                    OutputFormat::Text => {
                        for user in &members {
                            println!("{:<8}  {}", user.id, user.login);
                        }
                        println!("\nShown: {} member(s)", members.len());
                    }
                }
            }
        }
        Ok(())
    }
}
