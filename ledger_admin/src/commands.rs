use std::fmt;
use uuid::Uuid;

/// An operator action against the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Apply the ledger schema.
    Migrate,
    /// Show a user's balance.
    Balance { user_id: String },
    /// Show a user's full history, newest first.
    History { user_id: String },
    Credit {
        user_id: String,
        amount: i64,
        description: String,
    },
    Debit {
        user_id: String,
        amount: i64,
        description: String,
    },
    Redeem {
        user_id: String,
        amount: i64,
        payout_reference: String,
    },
    /// List redemptions awaiting review.
    Pending,
    Approve { id: Uuid },
    Reject { id: Uuid },
    /// Check one user, or every account when no user is given.
    Reconcile { user_id: Option<String> },
}

/// Errors that can occur during command parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No subcommand given.
    MissingCommand,
    /// A required positional argument is absent.
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    /// Amount is not a whole number.
    InvalidAmount(String),
    /// Transaction id is not a UUID.
    InvalidTransactionId(String),
    /// Extra arguments after a complete command.
    UnexpectedArgument(String),
    /// Unrecognized subcommand.
    UnrecognizedCommand(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCommand => {
                write!(f, "No command given. Run with --help to see available commands")
            }
            Self::MissingArgument { command, argument } => {
                write!(f, "'{command}' requires <{argument}>")
            }
            Self::InvalidAmount(value) => write!(
                f,
                "Invalid amount '{value}'. Must be a whole number of coins (e.g., 'credit alice 100 bonus')"
            ),
            Self::InvalidTransactionId(value) => {
                write!(f, "Invalid transaction id '{value}'. Expected a UUID")
            }
            Self::UnexpectedArgument(value) => write!(f, "Unexpected argument '{value}'"),
            Self::UnrecognizedCommand(cmd) => write!(
                f,
                "Unrecognized command '{cmd}'. Run with --help to see available commands"
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse positional arguments into a [`Command`].
///
/// # Examples
///
/// ```ignore
/// let args: Vec<String> = vec!["balance".into(), "alice".into()];
/// assert_eq!(
///     parse_command(&args),
///     Ok(Command::Balance { user_id: "alice".into() })
/// );
/// ```
pub fn parse_command(args: &[String]) -> Result<Command, ParseError> {
    let Some((name, rest)) = args.split_first() else {
        return Err(ParseError::MissingCommand);
    };

    let mut rest = rest.iter().map(String::as_str);

    let command = match name.as_str() {
        "migrate" => Command::Migrate,
        "pending" => Command::Pending,
        "balance" => Command::Balance {
            user_id: required(&mut rest, "balance", "user")?,
        },
        "history" => Command::History {
            user_id: required(&mut rest, "history", "user")?,
        },
        "credit" => Command::Credit {
            user_id: required(&mut rest, "credit", "user")?,
            amount: parse_amount(&required(&mut rest, "credit", "amount")?)?,
            description: remainder(&mut rest, "credit", "description")?,
        },
        "debit" => Command::Debit {
            user_id: required(&mut rest, "debit", "user")?,
            amount: parse_amount(&required(&mut rest, "debit", "amount")?)?,
            description: remainder(&mut rest, "debit", "description")?,
        },
        "redeem" => Command::Redeem {
            user_id: required(&mut rest, "redeem", "user")?,
            amount: parse_amount(&required(&mut rest, "redeem", "amount")?)?,
            payout_reference: required(&mut rest, "redeem", "payout_reference")?,
        },
        "approve" => Command::Approve {
            id: parse_id(&required(&mut rest, "approve", "transaction_id")?)?,
        },
        "reject" => Command::Reject {
            id: parse_id(&required(&mut rest, "reject", "transaction_id")?)?,
        },
        "reconcile" => Command::Reconcile {
            user_id: rest.next().map(str::to_string),
        },
        other => return Err(ParseError::UnrecognizedCommand(other.to_string())),
    };

    match rest.next() {
        Some(extra) => Err(ParseError::UnexpectedArgument(extra.to_string())),
        None => Ok(command),
    }
}

fn required<'a>(
    rest: &mut impl Iterator<Item = &'a str>,
    command: &'static str,
    argument: &'static str,
) -> Result<String, ParseError> {
    rest.next()
        .map(str::to_string)
        .ok_or(ParseError::MissingArgument { command, argument })
}

/// Join the remaining words, so descriptions need no quoting
fn remainder<'a>(
    rest: &mut impl Iterator<Item = &'a str>,
    command: &'static str,
    argument: &'static str,
) -> Result<String, ParseError> {
    let joined = rest.collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        Err(ParseError::MissingArgument { command, argument })
    } else {
        Ok(joined)
    }
}

fn parse_amount(value: &str) -> Result<i64, ParseError> {
    value
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidAmount(value.to_string()))
}

fn parse_id(value: &str) -> Result<Uuid, ParseError> {
    Uuid::parse_str(value).map_err(|_| ParseError::InvalidTransactionId(value.to_string()))
}
