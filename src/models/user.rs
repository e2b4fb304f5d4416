use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::time::Duration;
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn check_password(&self, raw_password: &str) -> bool {
        check_password(raw_password, &self.password_hash)
    }
}

/// Fields needed to create a user directly, bypassing email verification.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub phone: String,
}

/// A signup waiting for its email to be confirmed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PendingUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub otp: String,
    pub is_email_verified: bool,
    pub otp_created_at: DateTime<Utc>,
}

impl PendingUser {
    pub fn set_password(&mut self, raw_password: &str, cost: u32) -> AppResult<()> {
        self.password_hash = hash_password(raw_password, cost)?;
        Ok(())
    }

    pub fn check_password(&self, raw_password: &str) -> bool {
        check_password(raw_password, &self.password_hash)
    }

    pub fn is_otp_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        otp_cutoff(now, ttl).is_some_and(|cutoff| self.otp_created_at < cutoff)
    }
}

/// Codes issued before the returned instant have expired. `None` when the TTL
/// reaches past the representable range, so nothing has expired yet.
pub fn otp_cutoff(now: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    let ttl = chrono::Duration::from_std(ttl).ok()?;
    now.checked_sub_signed(ttl)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Signup {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub password: String,
}

pub fn hash_password(raw_password: &str, cost: u32) -> AppResult<String> {
    let hashed = bcrypt::hash(raw_password, cost)
        .map_err(|e| anyhow::anyhow!("Hash error: {}", e))?;
    Ok(hashed)
}

/// A malformed stored hash never matches.
pub fn check_password(raw_password: &str, password_hash: &str) -> bool {
    bcrypt::verify(raw_password, password_hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(otp_created_at: DateTime<Utc>) -> PendingUser {
        PendingUser {
            id: Uuid::new_v4(),
            email: "ravi@example.com".to_string(),
            first_name: "Ravi".to_string(),
            last_name: "Kumar".to_string(),
            phone: "9876543210".to_string(),
            password_hash: String::new(),
            otp: "123456".to_string(),
            is_email_verified: false,
            otp_created_at,
        }
    }

    #[test]
    fn pending_user_password_round_trip() {
        let mut user = pending(Utc::now());
        user.set_password("s3cret-pass", 4).unwrap();

        assert_ne!(user.password_hash, "s3cret-pass");
        assert!(user.check_password("s3cret-pass"));
        assert!(!user.check_password("wrong"));
    }

    #[test]
    fn empty_hash_never_matches() {
        let user = pending(Utc::now());
        assert!(!user.check_password(""));
    }

    #[test]
    fn otp_expires_after_ttl() {
        let issued = Utc::now();
        let user = pending(issued);
        let ttl = Duration::from_secs(600);

        assert!(!user.is_otp_expired(issued + chrono::Duration::seconds(599), ttl));
        assert!(user.is_otp_expired(issued + chrono::Duration::seconds(601), ttl));
    }

    #[test]
    fn huge_ttl_never_expires() {
        let user = pending(Utc::now() - chrono::Duration::days(3650));

        assert_eq!(otp_cutoff(Utc::now(), Duration::MAX), None);
        assert_eq!(otp_cutoff(Utc::now(), Duration::from_secs(u64::MAX / 2)), None);
        assert!(!user.is_otp_expired(Utc::now(), Duration::MAX));
    }

    #[test]
    fn full_name_trims_missing_parts() {
        let user = User {
            id: Uuid::new_v4(),
            username: "a@example.com".to_string(),
            email: "a@example.com".to_string(),
            first_name: "Asha".to_string(),
            last_name: String::new(),
            password_hash: String::new(),
            is_active: true,
            date_joined: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(user.full_name(), "Asha");
    }
}
