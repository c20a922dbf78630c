use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Marketplace role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Guest,
    Host,
    Admin,
}

impl UserRole {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_uppercase().as_str() {
            "GUEST" => Ok(UserRole::Guest),
            "HOST" => Ok(UserRole::Host),
            "ADMIN" => Ok(UserRole::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Guest => "GUEST",
            UserRole::Host => "HOST",
            UserRole::Admin => "ADMIN",
        }
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        role.as_str().to_string()
    }
}

/// User model mirroring an identity-provider account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub external_id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub role: String, // Stored as TEXT, use UserRole enum for type safety
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    /// Get role as an enum; unknown values degrade to guest
    pub fn role_enum(&self) -> UserRole {
        UserRole::from_str(&self.role).unwrap_or(UserRole::Guest)
    }

    pub fn is_admin(&self) -> bool {
        self.role_enum() == UserRole::Admin
    }

    pub fn is_host(&self) -> bool {
        matches!(self.role_enum(), UserRole::Host | UserRole::Admin)
    }
}

/// Profile fields a user may edit about themselves
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub bio: Option<String>,
    pub phone: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(bio) = &self.bio {
            if bio.chars().count() > 2000 {
                return Err("Bio must be at most 2000 characters".to_string());
            }
        }
        if let Some(phone) = &self.phone {
            let valid = phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
            if !valid || phone.len() > 32 {
                return Err(format!("Invalid phone number: {}", phone));
            }
        }
        Ok(())
    }
}
