mod account;
mod doc;
mod group;

pub use account::AccountCommand;
pub use doc::DocCommand;
pub use group::GroupCommand;

use clap::ValueEnum;

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
