//! Authorized operations on documents, groups and users.

mod documents;
mod groups;
mod users;

pub use documents::DocumentService;
pub use groups::GroupService;
pub use users::UserService;

use crate::models::{Actor, UserId};
use crate::{Error, Result};

/// Operations that make no sense for the anonymous actor.
pub(crate) fn require_user(actor: Actor) -> Result<UserId> {
    actor.user_id().ok_or(Error::Unauthenticated)
}
