use crate::{Error, Result};

/// Longest secret bcrypt takes into account.
pub const MAX_SECRET_BYTES: usize = 72;

/// bcrypt credential hashing.
///
/// Both directions run on the blocking pool so a login never stalls the
/// runtime. Tests hash at the minimum cost.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        if cfg!(test) {
            Self::new(4) // bcrypt minimum cost (bcrypt::MIN_COST is private)
        } else {
            Self::new(bcrypt::DEFAULT_COST)
        }
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, secret: &str) -> Result<String> {
        if secret.len() > MAX_SECRET_BYTES {
            return Err(Error::Invalid(format!(
                "password is longer than {} bytes",
                MAX_SECRET_BYTES
            )));
        }
        let secret = secret.to_owned();
        let cost = self.cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(secret, cost))
            .await
            .map_err(|e| Error::Credential(e.to_string()))?
            .map_err(|e| Error::Credential(e.to_string()))
    }

    /// Checks `secret` against a stored digest. Malformed digests never match.
    pub async fn verify(&self, secret: &str, stored: &str) -> Result<bool> {
        let secret = secret.to_owned();
        let stored = stored.to_owned();

        let verdict = tokio::task::spawn_blocking(move || bcrypt::verify(secret, &stored))
            .await
            .map_err(|e| Error::Credential(e.to_string()))?;
        match verdict {
            Ok(matches) => Ok(matches),
            Err(e) => {
                tracing::warn!("Unreadable credential digest: {}", e);
                Ok(false)
            }
        }
    }
}
