//! Account store: one balance row per user in `ledger_accounts`.
//!
//! Functions take a `&mut PgConnection` so callers can run them inside the
//! same `sqlx::Transaction` as the matching transaction-log write.
#![allow(clippy::needless_raw_string_hashes)]

use sqlx::{PgConnection, Row, postgres::PgRow};

use crate::ledger::{Account, LedgerError, LedgerResult};

pub(crate) fn account_from_row(row: &PgRow) -> LedgerResult<Account> {
    Ok(Account {
        user_id: row.try_get("user_id")?,
        balance: row.try_get("balance")?,
        created_at: row
            .try_get::<chrono::NaiveDateTime, _>("created_at")?
            .and_utc(),
        last_updated: row
            .try_get::<chrono::NaiveDateTime, _>("last_updated")?
            .and_utc(),
    })
}

/// Find an account without creating it
pub async fn find(conn: &mut PgConnection, user_id: &str) -> LedgerResult<Option<Account>> {
    let row = sqlx::query(
        r#"
        SELECT user_id, balance, created_at, last_updated
        FROM ledger_accounts
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(account_from_row).transpose()
}

/// Return the existing account or create one at zero
pub async fn get_or_create(conn: &mut PgConnection, user_id: &str) -> LedgerResult<Account> {
    sqlx::query(
        "INSERT INTO ledger_accounts (user_id, balance)
         VALUES ($1, 0)
         ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query(
        r#"
        SELECT user_id, balance, created_at, last_updated
        FROM ledger_accounts
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    account_from_row(&row)
}

/// List every account, ordered by user id
pub async fn list(conn: &mut PgConnection) -> LedgerResult<Vec<Account>> {
    let rows = sqlx::query(
        r#"
        SELECT user_id, balance, created_at, last_updated
        FROM ledger_accounts
        ORDER BY user_id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(account_from_row).collect()
}

/// Atomically apply a signed balance change
///
/// The account must already exist (see [`get_or_create`]).
///
/// # Errors
///
/// * `LedgerError::InsufficientBalance` - A negative delta would overdraw the account
/// * `LedgerError::BalanceOverflow` - A positive delta would overflow the balance
pub async fn apply_delta(
    conn: &mut PgConnection,
    user_id: &str,
    delta: i64,
) -> LedgerResult<Account> {
    if delta < 0 {
        let required = delta.checked_neg().ok_or(LedgerError::InvalidAmount(delta))?;

        // Check and update in a single statement so two concurrent debits
        // cannot both pass the balance check
        let row = sqlx::query(
            "UPDATE ledger_accounts
             SET balance = balance - $1, last_updated = NOW()
             WHERE user_id = $2 AND balance >= $1
             RETURNING user_id, balance, created_at, last_updated",
        )
        .bind(required)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        return match row {
            Some(row) => account_from_row(&row),
            None => {
                let available = find(conn, user_id).await?.map_or(0, |a| a.balance);
                Err(LedgerError::InsufficientBalance {
                    available,
                    required,
                })
            }
        };
    }

    // Lock the row first so the overflow check sees the value we overwrite
    let current = sqlx::query("SELECT balance FROM ledger_accounts WHERE user_id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    let current_balance: i64 = current.try_get("balance")?;

    let new_balance = current_balance
        .checked_add(delta)
        .ok_or(LedgerError::BalanceOverflow)?;

    let row = sqlx::query(
        "UPDATE ledger_accounts
         SET balance = $1, last_updated = NOW()
         WHERE user_id = $2
         RETURNING user_id, balance, created_at, last_updated",
    )
    .bind(new_balance)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    account_from_row(&row)
}
