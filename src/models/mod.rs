mod access;
mod document;
mod group;
mod user;

pub use access::{AccessChangeRequest, AccessLevel, AccessOverride, Actor, Subject};
pub use document::{Document, DocumentDraft, DocumentUpdate};
pub use group::{Group, GroupDraft, MemberRequest};
pub use user::{LoginRequest, LoginResponse, User, UserUpdate};

pub type UserId = i64;
pub type DocId = i64;
pub type GroupId = i64;
