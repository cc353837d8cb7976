use clap::{Args, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use super::OutputFormat;
use docshare::client::ApiClient;
use docshare::models::{AccessLevel, DocId, DocumentDraft, DocumentUpdate, Subject};

#[derive(Args)]
pub struct DocCommand {
    #[command(subcommand)]
    pub command: DocSubcommand,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SubjectKind {
    User,
    Group,
}

#[derive(Subcommand)]
pub enum DocSubcommand {
    /// Create a document from a file (or stdin with "-")
    Create {
        file: PathBuf,

        /// Language tag used to pick a linter
        #[arg(long, default_value = "text")]
        lang: String,

        /// Access for everyone without an explicit grant
        #[arg(long, default_value = "none")]
        access: AccessLevel,
    },

    /// List your documents
    List {
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a document
    Get {
        id: DocId,

        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Replace a document's text
    Edit {
        id: DocId,
        file: PathBuf,

        /// New language tag (defaults to the current one)
        #[arg(long)]
        lang: Option<String>,

        /// New default access (owner only)
        #[arg(long)]
        access: Option<AccessLevel>,
    },

    /// Delete a document
    Delete { id: DocId },

    /// Grant a user or group access to a document
    Share {
        id: DocId,

        #[arg(long, value_enum, default_value = "user")]
        kind: SubjectKind,

        /// User or group id
        subject: i64,

        access: AccessLevel,
    },

    /// Run the linter again
    Inspect { id: DocId },
}

fn read_source(file: &Path) -> std::io::Result<String> {
    if file.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin())
    } else {
        std::fs::read_to_string(file)
    }
}

impl DocCommand {
    pub async fn run(&self, client: &ApiClient) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            DocSubcommand::Create { file, lang, access } => {
                let draft = DocumentDraft {
                    text: read_source(file)?,
                    lang: lang.clone(),
                    access: *access,
                };
                let doc = client.create_document(&draft).await?;
                println!("Created document {}", doc.id);
            }
            DocSubcommand::List { format } => {
                let docs = client.list_documents().await?;
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&docs)?),
                    OutputFormat::Text => {
                        if docs.is_empty() {
                            println!("No documents found");
                            return Ok(());
                        }
                        println!("{:<8}  {:<10}  {:<8}  LINT", "ID", "LANG", "ACCESS");
                        println!("{}", "-".repeat(60));
                        for doc in &docs {
                            println!(
                                "{:<8}  {:<10}  {:<8}  {}",
                                doc.id,
                                doc.lang,
                                doc.access.to_string(),
                                doc.lint_status.lines().next().unwrap_or_default()
                            );
                        }
                        println!("\nTotal: {} document(s)", docs.len());
                    }
                }
            }
            DocSubcommand::Get { id, format } => {
                let doc = client.get_document(*id).await?;
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&doc)?),
                    OutputFormat::Text => println!("{}", doc),
                }
            }
            DocSubcommand::Edit {
                id,
                file,
                lang,
                access,
            } => {
                let lang = match lang {
                    Some(lang) => lang.clone(),
                    None => client.get_document(*id).await?.lang,
                };
                let update = DocumentUpdate {
                    text: read_source(file)?,
                    lang,
                    access: *access,
                };
                let doc = client.edit_document(*id, &update).await?;
                println!("Updated document {} (version {})", doc.id, doc.version);
            }
            DocSubcommand::Delete { id } => {
                client.delete_document(*id).await?;
                println!("Deleted document {}", id);
            }
            DocSubcommand::Share {
                id,
                kind,
                subject,
                access,
            } => {
                let subject = match kind {
                    SubjectKind::User => Subject::User(*subject),
                    SubjectKind::Group => Subject::Group(*subject),
                };
                client.change_access(*id, subject, *access).await?;
                println!("Granted {} on document {}", access, id);
            }
            DocSubcommand::Inspect { id } => {
                client.launch_inspection(*id).await?;
                println!("Inspection queued for document {}", id);
            }
        }
        Ok(())
    }
}
