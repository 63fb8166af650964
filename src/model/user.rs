use serde::{Deserialize, Serialize};

/// Login account. Admins and HR staff sign in with email + password;
/// kiosks are provisioned as `Kiosk` users.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub password: String,
    pub role_id: u8,
    pub employee_id: Option<u64>,
    pub is_active: bool,
}
