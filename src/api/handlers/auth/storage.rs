//! Database helpers for accounts and verification tokens.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::lockout::FailureUpdate;
use super::tokens::TokenKind;
use super::utils::is_unique_violation;

/// Outcome when attempting to create a new account.
#[derive(Debug)]
pub(crate) enum SignupOutcome {
    Created(Uuid),
    Conflict,
}

/// Full account row as read by the auth flows.
#[derive(Debug, Clone)]
pub(crate) struct AccountRecord {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) password_hash: String,
    pub(crate) email_verified_at: Option<DateTime<Utc>>,
    pub(crate) failed_login_attempts: i32,
    pub(crate) lockout_until: Option<DateTime<Utc>>,
    pub(crate) token_version: i64,
}

/// Token row for exact-value lookups (verification, email change).
#[derive(Debug)]
pub(crate) struct TokenRecord {
    pub(crate) id: Uuid,
    pub(crate) account_id: Uuid,
    pub(crate) new_email: Option<String>,
}

/// Token row for the password-reset digest scan.
#[derive(Debug)]
pub(crate) struct ResetTokenRecord {
    pub(crate) id: Uuid,
    pub(crate) account_id: Uuid,
    pub(crate) secret: String,
}

const ACCOUNT_COLUMNS: &str = "id, name, email, password_hash, email_verified_at, \
     failed_login_attempts, lockout_until, token_version";

fn account_from_row(row: &sqlx::postgres::PgRow) -> AccountRecord {
    AccountRecord {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        email_verified_at: row.get("email_verified_at"),
        failed_login_attempts: row.get("failed_login_attempts"),
        lockout_until: row.get("lockout_until"),
        token_version: row.get("token_version"),
    }
}

pub(crate) async fn lookup_account_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<AccountRecord>> {
    let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = %query
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account by email")?;
    Ok(row.as_ref().map(account_from_row))
}

pub(crate) async fn lookup_account_by_id(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<AccountRecord>> {
    let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = %query
    );
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account by id")?;
    Ok(row.as_ref().map(account_from_row))
}

/// Insert a new account, mapping the unique-email violation to `Conflict`.
///
/// The database constraint is the authoritative uniqueness check; the
/// handler's pre-check only exists for a friendlier error message.
pub(crate) async fn insert_account(
    executor: impl sqlx::PgExecutor<'_>,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<SignupOutcome> {
    let query = r"
        INSERT INTO accounts (name, email, password_hash)
        VALUES ($1, $2, $3)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(executor)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created(row.get("id"))),
        Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert account"),
    }
}

/// Apply a failed-login outcome as a single UPDATE.
///
/// Locking zeroes the counter in the same statement, so the counter and
/// an active lockout are never both in effect.
pub(crate) async fn record_failed_login(
    pool: &PgPool,
    account_id: Uuid,
    update: FailureUpdate,
    lockout_duration: Duration,
) -> Result<()> {
    match update {
        FailureUpdate::Increment(attempts) => {
            let query = r"
                UPDATE accounts
                SET failed_login_attempts = $2, updated_at = NOW()
                WHERE id = $1
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(account_id)
                .bind(attempts)
                .execute(pool)
                .instrument(span)
                .await
                .context("failed to record failed login")?;
        }
        FailureUpdate::Lock => {
            let query = r"
                UPDATE accounts
                SET failed_login_attempts = 0,
                    lockout_until = NOW() + ($2 * INTERVAL '1 second'),
                    updated_at = NOW()
                WHERE id = $1
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(account_id)
                .bind(lockout_duration.num_seconds())
                .execute(pool)
                .instrument(span)
                .await
                .context("failed to lock account")?;
        }
    }
    Ok(())
}

/// Clear residual failure state after a successful login.
pub(crate) async fn clear_login_failures(pool: &PgPool, account_id: Uuid) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET failed_login_attempts = 0, lockout_until = NULL, updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to clear login failures")?;
    Ok(())
}

/// Replace the password hash and bump the credential epoch in one UPDATE.
pub(crate) async fn update_password(
    executor: impl sqlx::PgExecutor<'_>,
    account_id: Uuid,
    password_hash: &str,
) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET password_hash = $2,
            token_version = token_version + 1,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .bind(password_hash)
        .execute(executor)
        .instrument(span)
        .await
        .context("failed to update password")?;
    Ok(())
}

pub(crate) async fn update_name(pool: &PgPool, account_id: Uuid, name: &str) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET name = $2, updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .bind(name)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update name")?;
    Ok(())
}

pub(crate) async fn mark_email_verified(
    executor: impl sqlx::PgExecutor<'_>,
    account_id: Uuid,
) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET email_verified_at = NOW(), updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .execute(executor)
        .instrument(span)
        .await
        .context("failed to mark email verified")?;
    Ok(())
}

/// Move the account to its pending address and mark it verified.
///
/// Returns `false` when another account claimed the address since the
/// token was issued; the unique constraint is the backstop for the
/// handler's pre-check.
pub(crate) async fn update_email(
    executor: impl sqlx::PgExecutor<'_>,
    account_id: Uuid,
    new_email: &str,
) -> Result<bool> {
    let query = r"
        UPDATE accounts
        SET email = $2, email_verified_at = NOW(), updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(account_id)
        .bind(new_email)
        .execute(executor)
        .instrument(span)
        .await;

    match result {
        Ok(_) => Ok(true),
        Err(err) if is_unique_violation(&err) => Ok(false),
        Err(err) => Err(err).context("failed to update email"),
    }
}

pub(crate) async fn insert_token(
    executor: impl sqlx::PgExecutor<'_>,
    kind: TokenKind,
    account_id: Uuid,
    secret: &str,
    new_email: Option<&str>,
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        INSERT INTO verification_tokens (kind, account_id, secret, new_email, expires_at)
        VALUES ($1, $2, $3, $4, NOW() + ($5 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(kind.as_str())
        .bind(account_id)
        .bind(secret)
        .bind(new_email)
        .bind(ttl_seconds)
        .execute(executor)
        .instrument(span)
        .await
        .context("failed to insert verification token")?;
    Ok(())
}

/// Exact-value lookup for kinds whose secret is stored as presented.
///
/// Expired tokens are filtered here, so they behave as nonexistent.
pub(crate) async fn lookup_token(
    pool: &PgPool,
    kind: TokenKind,
    secret: &str,
) -> Result<Option<TokenRecord>> {
    let query = r"
        SELECT id, account_id, new_email
        FROM verification_tokens
        WHERE kind = $1 AND secret = $2 AND expires_at > NOW()
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(kind.as_str())
        .bind(secret)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup verification token")?;

    Ok(row.map(|row| TokenRecord {
        id: row.get("id"),
        account_id: row.get("account_id"),
        new_email: row.get("new_email"),
    }))
}

/// Load all live password-reset tokens for the digest scan.
///
/// Reset tokens are rare and short-lived, so the scan stays small; the
/// digest is irreversible, which is the property the scan buys.
pub(crate) async fn load_reset_tokens(pool: &PgPool) -> Result<Vec<ResetTokenRecord>> {
    let query = r"
        SELECT id, account_id, secret
        FROM verification_tokens
        WHERE kind = 'password_reset' AND expires_at > NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to load password reset tokens")?;

    Ok(rows
        .into_iter()
        .map(|row| ResetTokenRecord {
            id: row.get("id"),
            account_id: row.get("account_id"),
            secret: row.get("secret"),
        })
        .collect())
}

pub(crate) async fn delete_token(executor: impl sqlx::PgExecutor<'_>, id: Uuid) -> Result<()> {
    let query = "DELETE FROM verification_tokens WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .execute(executor)
        .instrument(span)
        .await
        .context("failed to delete verification token")?;
    Ok(())
}

/// Drop every outstanding reset token for the account.
///
/// A single successful reset consumes the whole batch, so no concurrently
/// issued reset link stays redeemable.
pub(crate) async fn delete_reset_tokens(
    executor: impl sqlx::PgExecutor<'_>,
    account_id: Uuid,
) -> Result<()> {
    let query = r"
        DELETE FROM verification_tokens
        WHERE account_id = $1 AND kind = 'password_reset'
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .execute(executor)
        .instrument(span)
        .await
        .context("failed to delete password reset tokens")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ResetTokenRecord, SignupOutcome, TokenRecord};
    use uuid::Uuid;

    #[test]
    fn signup_outcome_debug_names() {
        let id = Uuid::nil();
        assert_eq!(
            format!("{:?}", SignupOutcome::Created(id)),
            format!("Created({id:?})")
        );
        assert_eq!(format!("{:?}", SignupOutcome::Conflict), "Conflict");
    }

    #[test]
    fn token_records_hold_values() {
        let record = TokenRecord {
            id: Uuid::nil(),
            account_id: Uuid::nil(),
            new_email: Some("new@x.com".to_string()),
        };
        assert_eq!(record.new_email.as_deref(), Some("new@x.com"));

        let record = ResetTokenRecord {
            id: Uuid::nil(),
            account_id: Uuid::nil(),
            secret: "$argon2id$stub".to_string(),
        };
        assert_eq!(record.secret, "$argon2id$stub");
    }
}
