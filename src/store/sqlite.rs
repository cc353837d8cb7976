//! SQLite store backed by an sqlx connection pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;

use super::{EntityKind, FencedWrite, Store, StoreError};
use crate::models::{
    AccessLevel, AccessOverride, DocId, Document, Group, GroupId, Subject, User, UserId,
};

const DOCUMENT_COLUMNS: &str = "id, owner_id, body, lang, default_access, lint_status, version";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

// Row types for database queries
#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    login: String,
    created_at: String,
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: i64,
    owner_id: Option<i64>,
    body: String,
    lang: String,
    default_access: i64,
    lint_status: String,
    version: i64,
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: i64,
    creator_id: i64,
    name: String,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| {
                StoreError::Corrupt(format!("created_at of user {}: {}", row.id, e))
            })?
            .with_timezone(&Utc);
        Ok(User {
            id: row.id,
            login: row.login,
            created_at,
        })
    }
}

impl TryFrom<DocumentRow> for Document {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(Document {
            id: row.id,
            owner: row.owner_id,
            text: row.body,
            lang: row.lang,
            access: decode_level(row.default_access)?,
            lint_status: row.lint_status,
            version: row.version,
        })
    }
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Group {
            id: row.id,
            creator: row.creator_id,
            name: row.name,
        }
    }
}

fn decode_level(code: i64) -> Result<AccessLevel, StoreError> {
    AccessLevel::from_code(code)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown access code {}", code)))
}

fn map_conflict(e: sqlx::Error, what: String) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Conflict(what);
        }
    }
    StoreError::Sqlx(e)
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and runs migrations.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(parent.to_path_buf(), e))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .foreign_keys(true)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    #[cfg(test)]
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn next_id(&self, kind: EntityKind) -> Result<i64, StoreError> {
        // A single UPDATE holds SQLite's write lock, so concurrent callers
        // are serialized by the database.
        let id = sqlx::query_scalar::<_, i64>(
            "UPDATE counters SET value = value + 1 WHERE kind = ? RETURNING value",
        )
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn insert_user(&self, user: &User, credential: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO users (id, login, created_at) VALUES (?, ?, ?)")
            .bind(user.id)
            .bind(&user.login)
            .bind(user.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_conflict(e, format!("login '{}'", user.login)))?;

        sqlx::query("INSERT INTO credentials (user_id, hash) VALUES (?, ?)")
            .bind(user.id)
            .bind(credential)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, login, created_at FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn get_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, login, created_at FROM users WHERE login = ?")
                .bind(login)
                .fetch_optional(&self.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn login_exists(&self, login: &str) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE login = ?)")
                .bind(login)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn credential(&self, id: UserId) -> Result<Option<String>, StoreError> {
        let hash = sqlx::query_scalar("SELECT hash FROM credentials WHERE user_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hash)
    }

    async fn update_user(&self, user: &User) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET login = ? WHERE id = ?")
            .bind(&user.login)
            .bind(user.id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_conflict(e, format!("login '{}'", user.login)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows: Vec<UserRow> =
            sqlx::query_as("SELECT id, login, created_at FROM users ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn insert_document(&self, doc: &Document) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, owner_id, body, lang, default_access, lint_status, version)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(doc.id)
        .bind(doc.owner)
        .bind(&doc.text)
        .bind(&doc.lang)
        .bind(doc.access.code())
        .bind(&doc.lint_status)
        .bind(doc.version)
        .execute(&self.pool)
        .await
        .map_err(|e| map_conflict(e, format!("document {}", doc.id)))?;
        Ok(())
    }

    async fn get_document(&self, id: DocId) -> Result<Option<Document>, StoreError> {
        let row: Option<DocumentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Document::try_from).transpose()
    }

    async fn update_document(&self, doc: &Document) -> Result<Option<Document>, StoreError> {
        let row: Option<DocumentRow> = sqlx::query_as(&format!(
            r#"
            UPDATE documents
            SET body = ?, lang = ?, default_access = ?, lint_status = ?, version = version + 1
            WHERE id = ?
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(&doc.text)
        .bind(&doc.lang)
        .bind(doc.access.code())
        .bind(&doc.lint_status)
        .bind(doc.id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Document::try_from).transpose()
    }

    async fn update_document_if_version(
        &self,
        doc: &Document,
    ) -> Result<FencedWrite, StoreError> {
        let row: Option<DocumentRow> = sqlx::query_as(&format!(
            r#"
            UPDATE documents
            SET body = ?, lang = ?, default_access = ?, lint_status = ?, version = version + 1
            WHERE id = ? AND version = ?
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(&doc.text)
        .bind(&doc.lang)
        .bind(doc.access.code())
        .bind(&doc.lint_status)
        .bind(doc.id)
        .bind(doc.version)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(FencedWrite::Written(Document::try_from(row)?));
        }

        let current: Option<i64> = sqlx::query_scalar("SELECT version FROM documents WHERE id = ?")
            .bind(doc.id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match current {
            Some(current) => FencedWrite::Stale { current },
            None => FencedWrite::Missing,
        })
    }

    async fn delete_document(&self, id: DocId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn documents_owned_by(&self, owner: UserId) -> Result<Vec<Document>, StoreError> {
        let rows: Vec<DocumentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM documents WHERE owner_id = ? ORDER BY id",
            DOCUMENT_COLUMNS
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Document::try_from).collect()
    }

    async fn set_override(&self, grant: &AccessOverride) -> Result<(), StoreError> {
        let (sql, subject_id) = match grant.subject {
            Subject::User(user) => (
                r#"
                INSERT INTO document_user_access (doc_id, user_id, access) VALUES (?, ?, ?)
                ON CONFLICT (doc_id, user_id) DO UPDATE SET access = excluded.access
                "#,
                user,
            ),
            Subject::Group(group) => (
                r#"
                INSERT INTO document_group_access (doc_id, group_id, access) VALUES (?, ?, ?)
                ON CONFLICT (doc_id, group_id) DO UPDATE SET access = excluded.access
                "#,
                group,
            ),
        };

        sqlx::query(sql)
            .bind(grant.doc_id)
            .bind(subject_id)
            .bind(grant.level.code())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn user_override(
        &self,
        doc: DocId,
        user: UserId,
    ) -> Result<Option<AccessLevel>, StoreError> {
        let code: Option<i64> = sqlx::query_scalar(
            "SELECT access FROM document_user_access WHERE doc_id = ? AND user_id = ?",
        )
        .bind(doc)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;
        code.map(decode_level).transpose()
    }

    async fn group_overrides(
        &self,
        doc: DocId,
    ) -> Result<Vec<(GroupId, AccessLevel)>, StoreError> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT group_id, access FROM document_group_access WHERE doc_id = ? ORDER BY group_id",
        )
        .bind(doc)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(group, code)| Ok((group, decode_level(code)?)))
            .collect()
    }

    async fn insert_group(&self, group: &Group) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO user_groups (id, creator_id, name) VALUES (?, ?, ?)")
            .bind(group.id)
            .bind(group.creator)
            .bind(&group.name)
            .execute(&self.pool)
            .await
            .map_err(|e| map_conflict(e, format!("group {}", group.id)))?;
        Ok(())
    }

    async fn get_group(&self, id: GroupId) -> Result<Option<Group>, StoreError> {
        let row: Option<GroupRow> =
            sqlx::query_as("SELECT id, creator_id, name FROM user_groups WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Group::from))
    }

    async fn update_group(&self, group: &Group) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE user_groups SET name = ? WHERE id = ?")
            .bind(&group.name)
            .bind(group.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_group(&self, id: GroupId) -> Result<bool, StoreError> {
        // Memberships and group overrides go with it (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM user_groups WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_member(&self, group: GroupId, user: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO group_members (group_id, user_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(group)
        .bind(user)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_member(&self, group: GroupId, user: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM group_members WHERE group_id = ? AND user_id = ?")
            .bind(group)
            .bind(user)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_member(&self, group: GroupId, user: UserId) -> Result<bool, StoreError> {
        let member: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM group_members WHERE group_id = ? AND user_id = ?)",
        )
        .bind(group)
        .bind(user)
        .fetch_one(&self.pool)
        .await?;
        Ok(member)
    }

    async fn members(
        &self,
        group: GroupId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<User>, StoreError> {
        let rows: Vec<UserRow> = sqlx::query_as(
            r#"
            SELECT u.id, u.login, u.created_at
            FROM group_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.group_id = ?
            ORDER BY u.id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(group)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn reset(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for table in [
            "document_group_access",
            "document_user_access",
            "group_members",
            "user_groups",
            "documents",
            "credentials",
            "users",
        ] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("UPDATE counters SET value = 0")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
