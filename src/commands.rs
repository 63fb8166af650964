//! One-shot maintenance commands run instead of the server.

use anyhow::{Context, Result, anyhow, bail};
use sqlx::MySqlPool;
use tracing::info;

use crate::auth::password::hash_password;
use crate::model::role::Role;

/// Credentials for `create-admin`, read from `ADMIN_EMAIL` and `ADMIN_PASSWORD`.
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

impl AdminSeed {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let email = lookup("ADMIN_EMAIL")
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| anyhow!("ADMIN_EMAIL must be set"))?;
        let password = lookup("ADMIN_PASSWORD").ok_or_else(|| anyhow!("ADMIN_PASSWORD must be set"))?;
        if password.len() < 8 {
            bail!("ADMIN_PASSWORD must be at least 8 characters");
        }
        Ok(Self { email, password })
    }
}

/// Creates an admin login. An existing account with the same email is left untouched.
pub async fn create_admin(pool: &MySqlPool, seed: &AdminSeed) -> Result<bool> {
    let existing: Option<(u64,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&seed.email)
        .fetch_optional(pool)
        .await
        .context("Failed to look up existing user")?;
    if existing.is_some() {
        info!(email = %seed.email, "User with this email already exists");
        return Ok(false);
    }

    let hashed = hash_password(&seed.password).map_err(|e| anyhow!("Failed to hash password: {e}"))?;

    sqlx::query(
        r#"
        INSERT INTO users (email, password, role_id, is_active)
        VALUES (?, ?, ?, TRUE)
        "#,
    )
    .bind(&seed.email)
    .bind(hashed)
    .bind(Role::Admin.id())
    .execute(pool)
    .await
    .context("Failed to create admin user")?;

    info!(email = %seed.email, "Admin user created");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_requires_both_values() {
        let missing = AdminSeed::from_lookup(|key| (key == "ADMIN_EMAIL").then(|| "a@b.c".to_string()));
        assert!(missing.is_err());

        let seed = AdminSeed::from_lookup(|key| match key {
            "ADMIN_EMAIL" => Some(" admin@company.com ".into()),
            "ADMIN_PASSWORD" => Some("long-enough".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(seed.email, "admin@company.com");
    }

    #[test]
    fn short_passwords_are_refused() {
        let seed = AdminSeed::from_lookup(|key| match key {
            "ADMIN_EMAIL" => Some("admin@company.com".into()),
            "ADMIN_PASSWORD" => Some("short".into()),
            _ => None,
        });
        assert!(seed.is_err());
    }
}
