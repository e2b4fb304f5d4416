use chrono::Utc;
use rand::Rng;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{hash_password, otp_cutoff, NewUser, PendingUser, Profile, Signup, User},
};

pub struct AccountsService {
    db: PgPool,
    config: Config,
}

impl AccountsService {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self { db, config }
    }

    // Signup / email verification

    /// Creates the pending registration for `signup.email`, or replaces the
    /// details and code of an earlier attempt with the same email.
    pub async fn register_pending(&self, signup: &Signup) -> AppResult<PendingUser> {
        let email = normalize_email(&signup.email)?;

        let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(&self.db)
            .await?;

        if existing.is_some() {
            return Err(AppError::EmailAlreadyRegistered);
        }

        let password_hash = hash_password(&signup.password, self.config.auth.bcrypt_cost)?;
        let code = self.generate_otp();

        let pending: PendingUser = sqlx::query_as(
            r#"
            INSERT INTO pending_users
                (id, email, first_name, last_name, phone, password_hash, otp, is_email_verified, otp_created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, false, NOW())
            ON CONFLICT (email)
            DO UPDATE SET first_name = $3, last_name = $4, phone = $5, password_hash = $6,
                          otp = $7, is_email_verified = false, otp_created_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(signup.first_name.trim())
        .bind(signup.last_name.trim())
        .bind(signup.phone.trim())
        .bind(password_hash)
        .bind(&code)
        .fetch_one(&self.db)
        .await?;

        self.send_otp_email(&pending.email, &code);
        tracing::info!(email = %pending.email, "Pending registration created");

        Ok(pending)
    }

    pub async fn resend_otp(&self, email: &str) -> AppResult<()> {
        let email = normalize_email(email)?;
        let code = self.generate_otp();

        let result = sqlx::query(
            "UPDATE pending_users SET otp = $1, otp_created_at = NOW(), is_email_verified = false WHERE email = $2",
        )
        .bind(&code)
        .bind(&email)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::PendingUserNotFound);
        }

        self.send_otp_email(&email, &code);
        Ok(())
    }

    pub async fn verify_email(&self, email: &str, code: &str) -> AppResult<PendingUser> {
        let email = normalize_email(email)?;
        let pending = self.get_pending(&email).await?;

        if pending.is_otp_expired(Utc::now(), self.config.otp.ttl) {
            return Err(AppError::OtpExpired);
        }

        if pending.otp != code.trim() {
            return Err(AppError::InvalidOtp);
        }

        let pending: PendingUser = sqlx::query_as(
            "UPDATE pending_users SET is_email_verified = true WHERE id = $1 RETURNING *",
        )
        .bind(pending.id)
        .fetch_one(&self.db)
        .await?;

        Ok(pending)
    }

    /// Turns a verified pending registration into a real user with a profile.
    pub async fn activate_pending_user(&self, email: &str) -> AppResult<User> {
        let email = normalize_email(email)?;
        let pending = self.get_pending(&email).await?;

        if !pending.is_email_verified {
            return Err(AppError::OtpNotVerified);
        }

        let mut tx = self.db.begin().await?;

        let user = insert_user(
            &mut tx,
            &NewUser {
                username: pending.email.clone(),
                email: pending.email.clone(),
                first_name: pending.first_name.clone(),
                last_name: pending.last_name.clone(),
                password_hash: pending.password_hash.clone(),
                phone: Some(pending.phone.clone()),
            },
        )
        .await?;

        sqlx::query("DELETE FROM pending_users WHERE id = $1")
            .bind(pending.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, "Account activated");
        Ok(user)
    }

    /// Deletes pending registrations whose code has outlived the OTP TTL.
    pub async fn purge_expired_pending_users(&self) -> AppResult<u64> {
        let Some(cutoff) = otp_cutoff(Utc::now(), self.config.otp.ttl) else {
            return Ok(0);
        };

        let result = sqlx::query("DELETE FROM pending_users WHERE otp_created_at < $1")
            .bind(cutoff)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    // Users and profiles

    pub async fn create_user(&self, new_user: &NewUser) -> AppResult<User> {
        let mut tx = self.db.begin().await?;
        let user = insert_user(&mut tx, new_user).await?;
        tx.commit().await?;
        Ok(user)
    }

    /// Writes the user's editable fields and makes sure its profile exists.
    pub async fn save_user(&self, user: &User) -> AppResult<User> {
        let mut tx = self.db.begin().await?;

        let saved: User = sqlx::query_as(
            r#"
            UPDATE users
            SET username = $1, email = $2, first_name = $3, last_name = $4,
                password_hash = $5, is_active = $6, updated_at = NOW()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::on_unique_violation(e, || AppError::EmailAlreadyRegistered))?
        .ok_or(AppError::UserNotFound)?;

        ensure_profile(&mut tx, saved.id, "").await?;

        tx.commit().await?;
        Ok(saved)
    }

    pub async fn get_user(&self, user_id: Uuid) -> AppResult<User> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        user.ok_or(AppError::UserNotFound)
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<User> {
        let email = normalize_email(email).map_err(|_| AppError::InvalidCredentials)?;

        let user: Option<User> =
            sqlx::query_as("SELECT * FROM users WHERE email = $1 AND is_active = true")
                .bind(&email)
                .fetch_optional(&self.db)
                .await?;

        match user {
            Some(user) if user.check_password(password) => Ok(user),
            _ => Err(AppError::InvalidCredentials),
        }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> AppResult<Profile> {
        let profile: Option<Profile> = sqlx::query_as("SELECT * FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        profile.ok_or(AppError::UserNotFound)
    }

    pub async fn update_profile_phone(&self, user_id: Uuid, phone: &str) -> AppResult<Profile> {
        let profile: Option<Profile> = sqlx::query_as(
            "UPDATE profiles SET phone = $1 WHERE user_id = $2 RETURNING *",
        )
        .bind(phone.trim())
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        profile.ok_or(AppError::UserNotFound)
    }

    // Helper methods

    async fn get_pending(&self, email: &str) -> AppResult<PendingUser> {
        let pending: Option<PendingUser> =
            sqlx::query_as("SELECT * FROM pending_users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.db)
                .await?;

        pending.ok_or(AppError::PendingUserNotFound)
    }

    fn generate_otp(&self) -> String {
        let mut rng = rand::thread_rng();
        let max = 10_u32.pow(self.config.otp.length as u32);
        let code: u32 = rng.gen_range(0..max);
        format!("{:0>width$}", code, width = self.config.otp.length)
    }

    fn send_otp_email(&self, email: &str, code: &str) {
        // In development, just log the code
        if self.config.is_development() {
            tracing::info!("Email OTP to {}: {}", email, code);
            return;
        }

        // Delivery is owned by the mailer; only the code is stored here.
        tracing::debug!(email, "Email OTP issued");
    }
}

async fn insert_user(tx: &mut Transaction<'_, Postgres>, new_user: &NewUser) -> AppResult<User> {
    let email = normalize_email(&new_user.email)?;

    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, email, first_name, last_name, password_hash, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, true)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&new_user.username)
    .bind(&email)
    .bind(&new_user.first_name)
    .bind(&new_user.last_name)
    .bind(&new_user.password_hash)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| AppError::on_unique_violation(e, || AppError::EmailAlreadyRegistered))?;

    ensure_profile(tx, user.id, new_user.phone.as_deref().unwrap_or("")).await?;

    Ok(user)
}

/// Inserts the user's profile unless it already has one.
async fn ensure_profile(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    phone: &str,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO profiles (id, user_id, phone)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(phone.trim())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::Validation(format!("Invalid email address: {}", email))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(
            normalize_email("  Ravi.Kumar@Example.COM ").unwrap(),
            "ravi.kumar@example.com"
        );
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for bad in ["", "no-at-sign", "@example.com", "user@localhost"] {
            assert!(
                matches!(normalize_email(bad), Err(AppError::Validation(_))),
                "{bad} should be rejected"
            );
        }
    }
}
