use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Account, AccountRow, NewAccount};

/// The email is already held by another account. Raised by the store's
/// unique index when a concurrent writer wins the race.
#[derive(Debug, thiserror::Error)]
#[error("email already taken")]
pub struct EmailTaken;

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Account>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Account>>;
    async fn insert(&self, new: NewAccount) -> anyhow::Result<Account>;
    /// Persists every mutable column of `account` and advances `updated_at`.
    async fn update(&self, account: &Account) -> anyhow::Result<Account>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
    async fn exists_by_email_excluding(
        &self,
        email: &str,
        exclude: Option<Uuid>,
    ) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgAccountRepository {
    db: PgPool,
}

impl PgAccountRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const COLUMNS: &str = "id, name, email, password_hash, gender, bio, created_at, updated_at";

fn unique_violation(err: sqlx::Error) -> anyhow::Error {
    let taken = matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation());
    if taken {
        EmailTaken.into()
    } else {
        anyhow::Error::new(err).context("write account")
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE email = $1",
            COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find account by email")?;
        row.map(Account::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find account by id")?;
        row.map(Account::try_from).transpose()
    }

    async fn insert(&self, new: NewAccount) -> anyhow::Result<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            INSERT INTO accounts (name, email, password_hash, gender, bio)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.gender.as_str())
        .bind(&new.bio)
        .fetch_one(&self.db)
        .await
        .map_err(unique_violation)?;
        Account::try_from(row)
    }

    async fn update(&self, account: &Account) -> anyhow::Result<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            UPDATE accounts
               SET name = $2, email = $3, password_hash = $4, gender = $5, bio = $6,
                   updated_at = now()
             WHERE id = $1
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(account.id)
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.gender.as_str())
        .bind(&account.bio)
        .fetch_optional(&self.db)
        .await
        .map_err(unique_violation)?
        .with_context(|| format!("account {} vanished during update", account.id))?;
        Account::try_from(row)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete account")?;
        Ok(res.rows_affected() > 0)
    }

    async fn exists_by_email_excluding(
        &self,
        email: &str,
        exclude: Option<Uuid>,
    ) -> anyhow::Result<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM accounts
                 WHERE email = $1 AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(email)
        .bind(exclude)
        .fetch_one(&self.db)
        .await
        .context("check email uniqueness")?;
        Ok(taken)
    }
}
