use chrono::Utc;
use std::sync::Arc;

use super::require_user;
use crate::auth::{PasswordHasher, TokenIssuer};
use crate::models::{Actor, LoginRequest, LoginResponse, User, UserId, UserUpdate};
use crate::store::{EntityKind, Store};
use crate::{Error, Result};

/// Registration, login and profile edits.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    hasher: PasswordHasher,
    tokens: TokenIssuer,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, tokens: TokenIssuer) -> Self {
        Self {
            store,
            hasher: PasswordHasher::default(),
            tokens,
        }
    }

    pub async fn register(&self, login: &str, password: &str) -> Result<User> {
        let login = checked_login(login)?;
        if password.is_empty() {
            return Err(Error::Invalid("password is required".to_string()));
        }
        if self.store.login_exists(login).await? {
            return Err(Error::AlreadyExists(format!("login '{}'", login)));
        }
        let digest = self.hasher.hash(password).await?;

        let user = User {
            id: self.store.next_id(EntityKind::User).await?,
            login: login.to_string(),
            created_at: Utc::now(),
        };
        self.store.insert_user(&user, &digest).await?;
        tracing::info!(user_id = user.id, login = %user.login, "User registered");
        Ok(user)
    }

    /// Checks credentials and issues a session token.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        let user = self
            .store
            .get_user_by_login(&request.login)
            .await?
            .ok_or(Error::Unauthenticated)?;
        let stored = self
            .store
            .credential(user.id)
            .await?
            .ok_or(Error::Unauthenticated)?;
        if !self.hasher.verify(&request.password, &stored).await? {
            tracing::debug!(login = %request.login, "Wrong password");
            return Err(Error::Unauthenticated);
        }

        let token = self.tokens.issue(user.id)?;
        Ok(LoginResponse { token, user })
    }

    /// The user a session token belongs to. Tokens of deleted users are rejected.
    pub async fn authenticate(&self, token: &str) -> Result<UserId> {
        let id = self.tokens.parse(token)?;
        match self.store.get_user(id).await? {
            Some(_) => Ok(id),
            None => Err(Error::Unauthenticated),
        }
    }

    pub async fn get_user(&self, id: UserId) -> Result<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| Error::not_found("user", id))
    }

    /// Changes a user's login. Users may only edit themselves.
    pub async fn edit_user(&self, actor: Actor, id: UserId, update: UserUpdate) -> Result<User> {
        if require_user(actor)? != id {
            return Err(Error::NoAccess);
        }
        let login = checked_login(&update.login)?;

        let mut user = self.get_user(id).await?;
        if user.login == login {
            return Ok(user);
        }
        user.login = login.to_string();
        if !self.store.update_user(&user).await? {
            return Err(Error::not_found("user", id));
        }
        Ok(user)
    }
}

fn checked_login(login: &str) -> Result<&str> {
    let login = login.trim();
    if login.is_empty() {
        return Err(Error::Invalid("login is required".to_string()));
    }
    Ok(login)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeDelta;

    fn service() -> UserService {
        UserService::new(
            Arc::new(MemoryStore::new()),
            TokenIssuer::new("test-secret", TimeDelta::hours(1)),
        )
    }

    fn credentials(login: &str, password: &str) -> LoginRequest {
        LoginRequest {
            login: login.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_validates() {
        let service = service();

        assert!(matches!(service.register("", "pw").await, Err(Error::Invalid(_))));
        assert!(matches!(service.register("ann", "").await, Err(Error::Invalid(_))));

        let ann = service.register("ann", "pw").await.unwrap();
        assert_eq!(ann.id, 1);
        assert!(matches!(
            service.register("ann", "other").await,
            Err(Error::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_register_stores_a_bcrypt_digest() {
        let service = service();

        let overlong = "p".repeat(73);
        assert!(matches!(
            service.register("ann", &overlong).await,
            Err(Error::Invalid(_))
        ));

        let ann = service.register("ann", "pw").await.unwrap();
        assert_eq!(ann.id, 1);
        let digest = service.store.credential(ann.id).await.unwrap().unwrap();
        assert!(digest.starts_with("$2"));
    }

    #[tokio::test]
    async fn test_login_and_authenticate() {
        let service = service();
        let ann = service.register("ann", "pw").await.unwrap();

        let response = service.login(&credentials("ann", "pw")).await.unwrap();
        assert_eq!(response.user, ann);
        assert_eq!(service.authenticate(&response.token).await.unwrap(), ann.id);

        assert!(matches!(
            service.login(&credentials("ann", "nope")).await,
            Err(Error::Unauthenticated)
        ));
        assert!(matches!(
            service.login(&credentials("bob", "pw")).await,
            Err(Error::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_token_for_unknown_user_is_rejected() {
        let service = service();
        let token = service.tokens.issue(9).unwrap();

        assert!(matches!(
            service.authenticate(&token).await,
            Err(Error::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_edit_user() {
        let service = service();
        let ann = service.register("ann", "pw").await.unwrap();
        let bob = service.register("bob", "pw").await.unwrap();
        let rename = |login: &str| UserUpdate {
            login: login.to_string(),
        };

        assert!(matches!(
            service.edit_user(Actor::User(bob.id), ann.id, rename("x")).await,
            Err(Error::NoAccess)
        ));
        assert!(matches!(
            service.edit_user(Actor::Anonymous, ann.id, rename("x")).await,
            Err(Error::Unauthenticated)
        ));
        assert!(matches!(
            service.edit_user(Actor::User(ann.id), ann.id, rename("bob")).await,
            Err(Error::AlreadyExists(_))
        ));

        let renamed = service
            .edit_user(Actor::User(ann.id), ann.id, rename("anna"))
            .await
            .unwrap();
        assert_eq!(renamed.login, "anna");
        service.login(&credentials("anna", "pw")).await.unwrap();
    }
}
