//! Operator command line for the coin ledger.
//!
//! Connects to PostgreSQL, runs one command against the ledger and the
//! redemption queue, and exits non-zero on failure or when reconciliation
//! finds drift.

mod commands;
mod config;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Error, anyhow};
use coin_ledger::{
    LedgerManager, RedemptionManager,
    db::{Database, LedgerRepository, PgLedgerRepository},
    ledger::{Account, Receipt, ReconciliationReport, Transaction, TransactionKind},
};
use commands::{Command, parse_command};
use config::AdminConfig;
use log::{info, warn};

const HELP: &str = "\
Operate the coin ledger

USAGE:
  ledger_admin [OPTIONS] <COMMAND>

COMMANDS:
  migrate                               Apply the ledger schema
  balance   <user>                      Show a user's balance
  history   <user>                      Show a user's transactions, newest first
  credit    <user> <amount> <desc...>   Add coins
  debit     <user> <amount> <desc...>   Spend coins
  redeem    <user> <amount> <ref>       Reserve coins for a payout
  pending                               List redemptions awaiting review
  approve   <transaction_id>            Approve a pending redemption
  reject    <transaction_id>            Reject a pending redemption and refund it
  reconcile [user]                      Check balances against history

OPTIONS:
  --db-url     URL         Database connection string  [default: env DATABASE_URL]
  --admin      ID          Operator recorded on resolutions  [default: env LEDGER_ADMIN_ID or ledger_admin]

FLAGS:
  --json                   Print results as JSON
  -h, --help               Print help information

ENVIRONMENT:
  DATABASE_URL                     PostgreSQL connection string
  LEDGER_RECENT_LIMIT              Recent history window  [default: 10]
  LEDGER_OPERATION_TIMEOUT_SECS    Per-operation timeout  [default: 10]
  LEDGER_MAX_PAYOUT_REFERENCE_LEN  Payout reference limit  [default: 128]
  (See .env.example for all configuration options)
";

struct Args {
    database_url: Option<String>,
    admin: Option<String>,
    json: bool,
    command: Command,
}

fn parse_args() -> Result<Option<Args>, Error> {
    let mut pargs = pico_args::Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        return Ok(None);
    }

    let json = pargs.contains("--json");
    let database_url = pargs.opt_value_from_str("--db-url")?;
    let admin = pargs.opt_value_from_str("--admin")?;

    let free = pargs
        .finish()
        .into_iter()
        .map(|arg| {
            arg.into_string()
                .map_err(|arg| anyhow!("Argument is not valid UTF-8: {arg:?}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(Args {
        database_url,
        admin,
        json,
        command: parse_command(&free)?,
    }))
}

#[tokio::main]
async fn main() -> Result<ExitCode, Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let Some(args) = parse_args()? else {
        print!("{HELP}");
        return Ok(ExitCode::SUCCESS);
    };

    env_logger::builder().format_target(false).init();

    let config = AdminConfig::from_env(args.database_url, args.admin)?;

    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;
    info!("Database connected successfully");

    if args.command == Command::Migrate {
        db.migrate()
            .await
            .map_err(|e| anyhow!("Migration failed: {}", e))?;
        info!("Ledger schema applied");
        db.close().await;
        return Ok(ExitCode::SUCCESS);
    }

    let pool = Arc::new(db.pool().clone());
    let repository: Arc<dyn LedgerRepository> = Arc::new(PgLedgerRepository::with_operation_timeout(
        pool,
        config.ledger.operation_timeout,
    ));
    let ledger = LedgerManager::new(repository.clone(), config.ledger.clone());
    let redemptions = RedemptionManager::new(repository);

    let output = Output { json: args.json };
    let result = run(args.command, &ledger, &redemptions, &config.admin_id, &output).await;

    db.close().await;

    match result {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => Ok(ExitCode::from(2)),
        Err(e) => {
            eprintln!("{}: {}", e.code(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Execute one command; `Ok(false)` means reconciliation found drift
async fn run(
    command: Command,
    ledger: &LedgerManager,
    redemptions: &RedemptionManager,
    admin_id: &str,
    output: &Output,
) -> coin_ledger::LedgerResult<bool> {
    match command {
        Command::Migrate => {}
        Command::Balance { user_id } => output.account(&ledger.get_balance(&user_id).await?),
        Command::History { user_id } => {
            output.transactions(&ledger.list_transactions(&user_id).await?)
        }
        Command::Credit {
            user_id,
            amount,
            description,
        } => output.receipt(&ledger.credit(&user_id, amount, &description).await?),
        Command::Debit {
            user_id,
            amount,
            description,
        } => output.receipt(&ledger.debit(&user_id, amount, &description).await?),
        Command::Redeem {
            user_id,
            amount,
            payout_reference,
        } => output.receipt(
            &ledger
                .request_redemption(&user_id, amount, &payout_reference)
                .await?,
        ),
        Command::Pending => output.transactions(&redemptions.pending().await?),
        Command::Approve { id } => output.receipt(&redemptions.approve(id, admin_id).await?),
        Command::Reject { id } => output.receipt(&redemptions.reject(id, admin_id).await?),
        Command::Reconcile { user_id } => {
            let reports = match user_id {
                Some(user_id) => vec![ledger.reconcile(&user_id).await?],
                None => ledger.reconcile_all().await?,
            };
            output.reports(&reports);

            let drifted = reports.iter().filter(|r| !r.is_consistent()).count();
            if drifted > 0 {
                warn!("{} of {} account(s) drifted", drifted, reports.len());
                return Ok(false);
            }
        }
    }

    Ok(true)
}

/// Renders results as text or JSON on stdout
struct Output {
    json: bool,
}

impl Output {
    fn emit<T: serde::Serialize>(&self, value: &T, text: impl FnOnce() -> String) {
        if self.json {
            match serde_json::to_string_pretty(value) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!("Failed to encode output: {}", e),
            }
        } else {
            println!("{}", text());
        }
    }

    fn account(&self, account: &Account) {
        self.emit(account, || format!("{}: {} coins", account.user_id, account.balance));
    }

    fn receipt(&self, receipt: &Receipt) {
        self.emit(receipt, || {
            format!(
                "{}\nbalance: {} coins",
                describe(&receipt.transaction),
                receipt.balance
            )
        });
    }

    fn transactions(&self, transactions: &[Transaction]) {
        self.emit(&transactions, || {
            if transactions.is_empty() {
                return "(no transactions)".to_string();
            }
            transactions
                .iter()
                .map(describe)
                .collect::<Vec<_>>()
                .join("\n")
        });
    }

    fn reports(&self, reports: &[ReconciliationReport]) {
        self.emit(&reports, || {
            reports
                .iter()
                .map(|r| {
                    let verdict = if r.is_consistent() { "ok" } else { "DRIFT" };
                    format!(
                        "{:<6} {}: stored {} computed {} ({} transactions)",
                        verdict,
                        r.user_id,
                        r.stored_balance,
                        r.computed_balance,
                        r.transaction_count
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        });
    }
}

fn describe(tx: &Transaction) -> String {
    let sign = match tx.kind {
        TransactionKind::Credit => '+',
        TransactionKind::Debit | TransactionKind::Redemption(_) => '-',
    };
    let status = tx
        .redemption()
        .map(|r| format!(" [{} -> {}]", r.status, r.payout_reference))
        .unwrap_or_default();

    format!(
        "{} {} {:<6} {}{:<8} {}{}",
        tx.created_at.format("%Y-%m-%d %H:%M:%S"),
        tx.id,
        tx.transaction_type().to_string(),
        sign,
        tx.amount,
        tx.description,
        status
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_EXAMPLE: &str = include_str!("../../.env.example");

    #[test]
    fn test_help_env_vars_are_in_env_example() {
        let documented: Vec<&str> = ENV_EXAMPLE
            .lines()
            .filter(|line| !line.starts_with('#'))
            .filter_map(|line| line.split_once('=').map(|(key, _)| key.trim()))
            .collect();

        let in_help = HELP
            .lines()
            .skip_while(|line| !line.starts_with("ENVIRONMENT:"))
            .skip(1)
            .filter_map(|line| line.split_whitespace().next())
            .filter(|word| word.chars().all(|c| c.is_ascii_uppercase() || c == '_'));

        for var in in_help {
            assert!(documented.contains(&var), "{var} missing from .env.example");
        }
        assert!(HELP.contains(".env.example"));
    }

    #[test]
    fn test_env_example_covers_config_reads() {
        for var in [
            "DATABASE_URL",
            "DB_MAX_CONNECTIONS",
            "DB_MIN_CONNECTIONS",
            "DB_CONNECTION_TIMEOUT",
            "DB_IDLE_TIMEOUT",
            "DB_MAX_LIFETIME",
            "LEDGER_RECENT_LIMIT",
            "LEDGER_OPERATION_TIMEOUT_SECS",
            "LEDGER_MAX_PAYOUT_REFERENCE_LEN",
            "LEDGER_ADMIN_ID",
        ] {
            assert!(ENV_EXAMPLE.contains(&format!("{var}=")), "{var} missing");
        }
    }
}
