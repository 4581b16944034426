use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::client::ClientError;

/// Which signed-in surface a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Persona {
    #[serde(rename = "user")]
    Shopper,
    #[serde(rename = "admin")]
    Admin,
}

/// Bearer tokens persisted as a small JSON file, one key per persona.
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    tokens: BTreeMap<Persona, String>,
}

impl TokenStore {
    /// Read the store at `path`. A missing file yields an empty store.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref().to_path_buf();
        let tokens = match fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, tokens })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn token(&self, persona: Persona) -> Option<&str> {
        self.tokens.get(&persona).map(String::as_str)
    }

    pub async fn save(&mut self, persona: Persona, token: impl Into<String>) -> Result<(), ClientError> {
        self.tokens.insert(persona, token.into());
        self.persist().await
    }

    pub async fn clear(&mut self, persona: Persona) -> Result<(), ClientError> {
        if self.tokens.remove(&persona).is_some() {
            self.persist().await?;
        }
        Ok(())
    }

    async fn persist(&self) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(&self.tokens)?;
        fs::write(&self.path, body).await?;
        tracing::debug!(path = %self.path.display(), "token store saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("wholecart-{}", Uuid::new_v4()))
            .join("tokens.json")
    }

    #[tokio::test]
    async fn missing_file_reads_empty() {
        let store = TokenStore::load(scratch_path()).await.unwrap();
        assert!(store.token(Persona::Shopper).is_none());
        assert!(store.token(Persona::Admin).is_none());
    }

    #[tokio::test]
    async fn personas_are_kept_apart_and_persisted() {
        let path = scratch_path();
        let mut store = TokenStore::load(&path).await.unwrap();
        store.save(Persona::Shopper, "shopper-token").await.unwrap();
        store.save(Persona::Admin, "admin-token").await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["user"], "shopper-token");
        assert_eq!(raw["admin"], "admin-token");

        let mut reloaded = TokenStore::load(&path).await.unwrap();
        assert_eq!(reloaded.token(Persona::Shopper), Some("shopper-token"));

        reloaded.clear(Persona::Admin).await.unwrap();
        let again = TokenStore::load(&path).await.unwrap();
        assert_eq!(again.token(Persona::Admin), None);
        assert_eq!(again.token(Persona::Shopper), Some("shopper-token"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
