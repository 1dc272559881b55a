//! Transaction log: append-only rows in `ledger_transactions`.
//!
//! Rows are never updated except for the status columns of a pending
//! redemption, and that update is conditional on `status = 'pending'`.
#![allow(clippy::needless_raw_string_hashes)]

use sqlx::{PgConnection, Row, postgres::PgRow};
use uuid::Uuid;

use crate::ledger::{
    LedgerError, LedgerResult, NewTransaction, Redemption, RedemptionDecision, RedemptionStatus,
    Resolution, SortOrder, Transaction, TransactionId, TransactionKind, TransactionType,
};

fn decode_error<E>(err: E) -> LedgerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    LedgerError::Database(sqlx::Error::Decode(Box::new(err)))
}

pub(crate) fn transaction_from_row(row: &PgRow) -> LedgerResult<Transaction> {
    let tx_type: TransactionType = row
        .try_get::<String, _>("tx_type")?
        .parse()
        .map_err(decode_error)?;

    let kind = match tx_type {
        TransactionType::Credit => TransactionKind::Credit,
        TransactionType::Debit => TransactionKind::Debit,
        TransactionType::Redeem => {
            let status: RedemptionStatus = row
                .try_get::<Option<String>, _>("status")?
                .unwrap_or_default()
                .parse()
                .map_err(decode_error)?;

            let resolved_by: Option<String> = row.try_get("resolved_by")?;
            let resolved_at: Option<chrono::NaiveDateTime> = row.try_get("resolved_at")?;
            let resolution = resolved_by.zip(resolved_at).map(|(by, at)| Resolution {
                resolved_by: by,
                resolved_at: at.and_utc(),
            });

            TransactionKind::Redemption(Redemption {
                payout_reference: row
                    .try_get::<Option<String>, _>("payout_reference")?
                    .unwrap_or_default(),
                status,
                resolution,
            })
        }
    };

    Ok(Transaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        amount: row.try_get("amount")?,
        description: row.try_get("description")?,
        kind,
        created_at: row
            .try_get::<chrono::NaiveDateTime, _>("created_at")?
            .and_utc(),
    })
}

/// Append a new transaction with a fresh id
pub async fn append(conn: &mut PgConnection, entry: &NewTransaction) -> LedgerResult<Transaction> {
    let (status, payout_reference) = match &entry.kind {
        TransactionKind::Redemption(redemption) => (
            Some(redemption.status.to_string()),
            Some(redemption.payout_reference.as_str()),
        ),
        TransactionKind::Credit | TransactionKind::Debit => (None, None),
    };

    let row = sqlx::query(
        r#"
        INSERT INTO ledger_transactions (id, user_id, tx_type, amount, description, status, payout_reference)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, user_id, tx_type, amount, description, status, payout_reference,
                  resolved_by, resolved_at, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&entry.user_id)
    .bind(entry.kind.transaction_type().to_string())
    .bind(entry.amount)
    .bind(&entry.description)
    .bind(status)
    .bind(payout_reference)
    .fetch_one(&mut *conn)
    .await?;

    transaction_from_row(&row)
}

/// List a user's transactions in creation order
///
/// `limit = None` returns the full history.
pub async fn list_by_user(
    conn: &mut PgConnection,
    user_id: &str,
    order: SortOrder,
    limit: Option<i64>,
) -> LedgerResult<Vec<Transaction>> {
    let direction = match order {
        SortOrder::NewestFirst => "DESC",
        SortOrder::OldestFirst => "ASC",
    };

    let rows = sqlx::query(&format!(
        r#"
        SELECT id, user_id, tx_type, amount, description, status, payout_reference,
               resolved_by, resolved_at, created_at
        FROM ledger_transactions
        WHERE user_id = $1
        ORDER BY created_at {direction}, seq {direction}
        LIMIT $2
        "#
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(transaction_from_row).collect()
}

/// Find a transaction by id
pub async fn find(conn: &mut PgConnection, id: TransactionId) -> LedgerResult<Option<Transaction>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, tx_type, amount, description, status, payout_reference,
               resolved_by, resolved_at, created_at
        FROM ledger_transactions
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(transaction_from_row).transpose()
}

/// List redemptions across all users, newest first
pub async fn list_redemptions(
    conn: &mut PgConnection,
    status: Option<RedemptionStatus>,
) -> LedgerResult<Vec<Transaction>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, tx_type, amount, description, status, payout_reference,
               resolved_by, resolved_at, created_at
        FROM ledger_transactions
        WHERE tx_type = 'redeem' AND ($1::TEXT IS NULL OR status = $1)
        ORDER BY created_at DESC, seq DESC
        "#,
    )
    .bind(status.map(|s| s.to_string()))
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(transaction_from_row).collect()
}

/// Move a pending redemption to its terminal status
///
/// The pending check and the write are one conditional statement, so of two
/// concurrent resolutions exactly one updates the row.
///
/// # Errors
///
/// * `LedgerError::NotFound` - No transaction with this id
/// * `LedgerError::InvalidTransition` - Not a redemption, or not pending
pub async fn update_redemption_status(
    conn: &mut PgConnection,
    id: TransactionId,
    decision: RedemptionDecision,
    resolved_by: &str,
) -> LedgerResult<Transaction> {
    let row = sqlx::query(
        r#"
        UPDATE ledger_transactions
        SET status = $1, resolved_by = $2, resolved_at = NOW()
        WHERE id = $3 AND tx_type = 'redeem' AND status = 'pending'
        RETURNING id, user_id, tx_type, amount, description, status, payout_reference,
                  resolved_by, resolved_at, created_at
        "#,
    )
    .bind(decision.target_status().to_string())
    .bind(resolved_by)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => transaction_from_row(&row),
        None => match find(conn, id).await? {
            Some(existing) => Err(LedgerError::InvalidTransition {
                id,
                current: existing.redemption_status(),
            }),
            None => Err(LedgerError::NotFound(id)),
        },
    }
}
