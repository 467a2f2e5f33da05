//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. It backs the
//! server when no `DATABASE_URL` is configured and is used by the tests.

use agent_core::domain::{AgentConfig, AuthSession, User, UserCredentials};
use agent_core::ports::{DatabaseService, PortError, PortResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserCredentials>,
    auth_sessions: HashMap<String, AuthSession>,
    configs: HashMap<Uuid, AgentConfig>,
}

/// Keeps users, login sessions and configurations in memory. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryDb {
    tables: RwLock<Tables>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == email) {
            return Err(PortError::Conflict(format!("User {} already exists", email)));
        }
        let user_id = Uuid::new_v4();
        tables.users.insert(
            user_id,
            UserCredentials {
                user_id,
                email: email.to_string(),
                hashed_password: hashed_password.to_string(),
            },
        );
        Ok(User {
            user_id,
            email: email.to_string(),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let tables = self.tables.read().await;
        tables
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        let now = Utc::now();
        tables.auth_sessions.retain(|_, session| session.expires_at > now);
        tables.auth_sessions.insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let tables = self.tables.read().await;
        tables
            .auth_sessions
            .get(session_id)
            .filter(|session| session.expires_at > Utc::now())
            .map(|session| session.user_id)
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables.write().await.auth_sessions.remove(session_id);
        Ok(())
    }

    async fn load_config(&self, user_id: Uuid) -> PortResult<Option<AgentConfig>> {
        Ok(self.tables.read().await.configs.get(&user_id).cloned())
    }

    async fn save_config(&self, user_id: Uuid, config: &AgentConfig) -> PortResult<()> {
        self.tables
            .write()
            .await
            .configs
            .insert(user_id, config.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let db = InMemoryDb::new();
        db.create_user_with_email("a@example.com", "hash").await.unwrap();
        let err = db.create_user_with_email("a@example.com", "hash").await.unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected() {
        let db = InMemoryDb::new();
        let user = db.create_user_with_email("a@example.com", "hash").await.unwrap();
        db.create_auth_session("live", user.user_id, Utc::now() + Duration::days(1))
            .await
            .unwrap();
        db.create_auth_session("old", user.user_id, Utc::now() - Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(db.validate_auth_session("live").await.unwrap(), user.user_id);
        assert!(matches!(
            db.validate_auth_session("old").await,
            Err(PortError::Unauthorized)
        ));

        db.delete_auth_session("live").await.unwrap();
        assert!(db.validate_auth_session("live").await.is_err());
    }

    #[tokio::test]
    async fn expired_sessions_are_dropped_when_a_new_one_is_issued() {
        let db = InMemoryDb::new();
        let user = db.create_user_with_email("a@example.com", "hash").await.unwrap();
        db.create_auth_session("old", user.user_id, Utc::now() - Duration::seconds(1))
            .await
            .unwrap();
        db.create_auth_session("new", user.user_id, Utc::now() + Duration::days(1))
            .await
            .unwrap();

        let tables = db.tables.read().await;
        assert!(!tables.auth_sessions.contains_key("old"));
        assert!(tables.auth_sessions.contains_key("new"));
    }

    #[tokio::test]
    async fn save_config_upserts() {
        let db = InMemoryDb::new();
        let user_id = Uuid::new_v4();
        assert!(db.load_config(user_id).await.unwrap().is_none());

        let mut config = AgentConfig::starter("CLIENT_1");
        db.save_config(user_id, &config).await.unwrap();
        config.name = "Второе имя".into();
        db.save_config(user_id, &config).await.unwrap();

        assert_eq!(db.load_config(user_id).await.unwrap(), Some(config));
    }
}
