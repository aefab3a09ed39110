mod logging;

use std::fs::File;
use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

pub use logging::init_logging;

use crate::application::{
    parse_amount_arg, BalanceChange, BatchOutcome, LedgerService, RequestResolution,
    DEFAULT_HISTORY_LIMIT,
};
use crate::domain::{format_amount, format_thousands, Caller, Currency, Transaction, UserId};
use crate::io::Exporter;

/// Guildbank - multi-currency community ledger
#[derive(Parser)]
#[command(name = "guildbank")]
#[command(about = "Balances, transfers and admin-approved deposits for a community")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "guildbank.db", global = true)]
    pub database: String,

    /// User id to act as
    #[arg(long = "as", default_value_t = 0, global = true)]
    pub as_user: UserId,

    /// Act with administrator rights
    #[arg(long, global = true)]
    pub admin: bool,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Deposit into your own account, effective immediately
    Deposit {
        /// Currency: AP, SP, YEN, REPUTATION
        currency: String,
        /// Whole amount
        amount: String,
        /// Why the deposit happened
        reason: Option<String>,
    },

    /// Request deposits that an admin approves by transaction id
    Request {
        /// Comma separated currencies, e.g. "AP,SP"
        currencies: String,
        /// Comma separated amounts matching the currencies, e.g. "50,30"
        amounts: String,
        /// Shared reason for the whole batch
        reason: Option<String>,
    },

    /// Request a deposit that an admin approves by reason
    Ask {
        currency: String,
        amount: String,
        /// Reason the admin will refer to when approving
        reason: String,
    },

    /// Spend from your own account
    Spend {
        currency: String,
        amount: String,
        reason: Option<String>,
    },

    /// Send yen to another user
    Transfer {
        /// Receiving user id
        to: UserId,
        amount: String,
    },

    /// Show balances (yours, or another user's as admin)
    Balance {
        /// Single currency to show
        currency: Option<String>,
        /// User to inspect
        #[arg(long)]
        user: Option<UserId>,
    },

    /// Show every account's balances (admin)
    Balances,

    /// Show recent transactions, newest first
    History {
        /// User to inspect (admin for anyone but yourself)
        #[arg(long)]
        user: Option<UserId>,
        /// Maximum number of rows
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },

    /// Give currency to a user (admin)
    Give {
        user: UserId,
        currency: String,
        amount: String,
    },

    /// Give currency to every known user (admin)
    GiveAll { currency: String, amount: String },

    /// Give currency to several users (admin)
    MultiGive {
        currency: String,
        amount: String,
        #[arg(required = true)]
        users: Vec<UserId>,
    },

    /// Remove currency from one or more users, stopping at zero (admin)
    Remove {
        currency: String,
        amount: String,
        #[arg(required = true)]
        users: Vec<UserId>,
    },

    /// List deposits awaiting approval (admin)
    Pending,

    /// Approve pending deposits by transaction id (admin)
    Approve {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Deny pending deposits by transaction id (admin)
    Deny {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Approve a user's deposit requests filed under a reason (admin)
    ApproveRequest { user: UserId, reason: String },

    /// Reject a user's deposit requests filed under a reason (admin)
    RejectRequest {
        user: UserId,
        reason: String,
        /// Explanation sent to the user
        #[arg(long)]
        note: Option<String>,
    },

    /// Verify that balances match the transaction log
    Check,

    /// Export data to CSV or JSON (admin)
    Export {
        /// What to export: transactions, balances, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Format: csv, json (default: csv, json for full)
        #[arg(short, long)]
        format: Option<String>,
    },
}

impl Cli {
    fn caller(&self) -> Caller {
        Caller {
            user_id: self.as_user,
            is_admin: self.admin,
        }
    }

    /// Log filter derived from the flags.
    pub fn log_filter(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            self.log_level.as_str()
        }
    }

    pub async fn run(self) -> Result<()> {
        let caller = self.caller();

        if matches!(self.command, Commands::Init) {
            LedgerService::init(&self.database).await?;
            println!("Database initialized: {}", self.database);
            return Ok(());
        }

        let service = LedgerService::connect(&self.database).await?;
        let result = run_command(&service, &caller, self.command).await;
        service.close().await;
        result
    }
}

async fn run_command(service: &LedgerService, caller: &Caller, command: Commands) -> Result<()> {
    match command {
        Commands::Init => anyhow::bail!("init runs before connecting to the database"),

        Commands::Deposit {
            currency,
            amount,
            reason,
        } => {
            let amount = parse_amount_arg(&amount)?;
            let change = service
                .deposit(caller, &currency, amount, reason.as_deref())
                .await?;
            println!(
                "Deposited {}. New balance: {} (#{})",
                format_amount(change.currency, change.delta),
                format_amount(change.currency, change.new_balance),
                change.transaction_id
            );
        }

        Commands::Request {
            currencies,
            amounts,
            reason,
        } => {
            let created = service
                .request_deposits(caller, &currencies, &amounts, reason.as_deref())
                .await?;
            println!("Recorded {} pending deposit(s):", created.len());
            for tx in &created {
                println!("  #{} {}", tx.id, format_amount(tx.currency, tx.amount));
            }
        }

        Commands::Ask {
            currency,
            amount,
            reason,
        } => {
            let amount = parse_amount_arg(&amount)?;
            let tx = service
                .request_deposit(caller, &currency, amount, Some(&reason))
                .await?;
            println!(
                "Requested {} for '{}' (#{})",
                format_amount(tx.currency, tx.amount),
                tx.reason,
                tx.id
            );
        }

        Commands::Spend {
            currency,
            amount,
            reason,
        } => {
            let amount = parse_amount_arg(&amount)?;
            let change = service
                .spend(caller, &currency, amount, reason.as_deref())
                .await?;
            println!(
                "Spent {}. New balance: {}",
                format_amount(change.currency, -change.delta),
                format_amount(change.currency, change.new_balance)
            );
        }

        Commands::Transfer { to, amount } => {
            let amount = parse_amount_arg(&amount)?;
            let result = service.transfer(caller, to, amount).await?;
            println!(
                "Transferred {} to user {}.",
                format_amount(Currency::Yen, amount),
                to
            );
            println!(
                "  Your new balance:     {}",
                format_amount(Currency::Yen, result.sender.new_balance)
            );
            println!(
                "  Receiver new balance: {}",
                format_amount(Currency::Yen, result.receiver.new_balance)
            );
        }

        Commands::Balance { currency, user } => {
            let user_id = user.unwrap_or(caller.user_id);
            match currency {
                Some(code) => {
                    let balance = service.balance(caller, user_id, &code).await?;
                    let currency = crate::application::parse_currency(&code)?;
                    println!(
                        "User {} {} balance: {}",
                        user_id,
                        currency,
                        format_amount(currency, balance)
                    );
                }
                None => {
                    let account = service.get_account(caller, user_id).await?;
                    println!("Balances for user {}:", user_id);
                    for (currency, balance) in account.balances() {
                        println!(
                            "  {:<12} {:>14}",
                            currency.as_str(),
                            format_amount(currency, balance)
                        );
                    }
                }
            }
        }

        Commands::Balances => {
            let accounts = service.all_balances(caller).await?;
            if accounts.is_empty() {
                println!("No users found.");
            } else {
                println!(
                    "{:<20} {:>10} {:>10} {:>12} {:>12}",
                    "USER", "AP", "SP", "YEN", "REPUTATION"
                );
                println!("{}", "-".repeat(68));
                for account in accounts {
                    println!(
                        "{:<20} {:>10} {:>10} {:>12} {:>12}",
                        account.user_id,
                        format_thousands(account.ap),
                        format_thousands(account.sp),
                        format_amount(Currency::Yen, account.yen),
                        format_thousands(account.reputation)
                    );
                }
            }
        }

        Commands::History { user, limit } => {
            let user_id = user.unwrap_or(caller.user_id);
            let transactions = service.history(caller, user_id, limit).await?;
            if transactions.is_empty() {
                println!("No transactions found for user {}.", user_id);
            } else {
                print_transactions(&transactions);
            }
        }

        Commands::Give {
            user,
            currency,
            amount,
        } => {
            let amount = parse_amount_arg(&amount)?;
            let change = service.give(caller, user, &currency, amount).await?;
            println!(
                "Gave {} to user {}. New balance: {}",
                format_amount(change.currency, change.delta),
                user,
                format_amount(change.currency, change.new_balance)
            );
        }

        Commands::GiveAll { currency, amount } => {
            let amount = parse_amount_arg(&amount)?;
            let outcome = service.give_all(caller, &currency, amount).await?;
            if outcome.succeeded.is_empty() && outcome.failed.is_empty() {
                println!("No users found.");
            } else {
                print_batch(&outcome, "Gave");
            }
        }

        Commands::MultiGive {
            currency,
            amount,
            users,
        } => {
            let amount = parse_amount_arg(&amount)?;
            let outcome = service.multi_give(caller, &currency, amount, &users).await?;
            print_batch(&outcome, "Gave");
        }

        Commands::Remove {
            currency,
            amount,
            users,
        } => {
            let amount = parse_amount_arg(&amount)?;
            let outcome = service.remove(caller, &currency, amount, &users).await?;
            print_batch(&outcome, "Removed");
        }

        Commands::Pending => {
            let pending = service.pending_deposits(caller).await?;
            if pending.is_empty() {
                println!("No pending deposits.");
            } else {
                print_transactions(&pending);
            }
        }

        Commands::Approve { ids } => resolve(service, caller, &ids, true).await?,

        Commands::Deny { ids } => resolve(service, caller, &ids, false).await?,

        Commands::ApproveRequest { user, reason } => {
            let resolution = service.approve_requests(caller, user, &reason).await?;
            print_resolution(&resolution, "Approved");
        }

        Commands::RejectRequest { user, reason, note } => {
            let resolution = service
                .reject_requests(caller, user, &reason, note.as_deref())
                .await?;
            print_resolution(&resolution, "Rejected");
        }

        Commands::Check => run_check_command(service).await?,

        Commands::Export {
            export_type,
            output,
            format,
        } => run_export_command(service, *caller, &export_type, output, format).await?,
    }
    Ok(())
}

async fn resolve(
    service: &LedgerService,
    caller: &Caller,
    ids: &[String],
    approve: bool,
) -> Result<()> {
    let outcome = service.resolve_pending(caller, ids, approve).await?;
    let verb = if approve { "Approved" } else { "Denied" };

    for resolved in &outcome.succeeded {
        let tx = &resolved.transaction;
        match resolved.new_balance {
            Some(balance) => println!(
                "{} #{}: {} for user {} (new balance {})",
                verb,
                tx.id,
                format_amount(tx.currency, tx.amount),
                tx.user_id,
                format_amount(tx.currency, balance)
            ),
            None => println!(
                "{} #{}: {} for user {}",
                verb,
                tx.id,
                format_amount(tx.currency, tx.amount),
                tx.user_id
            ),
        }
    }
    for failure in &outcome.failed {
        println!("Failed {}: {}", failure.item, failure.error);
    }
    Ok(())
}

fn print_batch(outcome: &BatchOutcome<BalanceChange>, verb: &str) {
    for change in &outcome.succeeded {
        println!(
            "{} {} for user {}. New balance: {}",
            verb,
            format_amount(change.currency, change.delta.abs()),
            change.user_id,
            format_amount(change.currency, change.new_balance)
        );
    }
    for skipped in &outcome.skipped {
        println!("Skipped user {}: {}", skipped.user_id, skipped.reason);
    }
    for failure in &outcome.failed {
        println!("Failed {}: {}", failure.item, failure.error);
    }
}

fn print_resolution(resolution: &RequestResolution, verb: &str) {
    if resolution.is_empty() {
        println!(
            "No matching requests for user {} with reason '{}'.",
            resolution.user_id, resolution.reason
        );
        return;
    }
    println!(
        "{} {} request(s) for user {}.",
        verb,
        resolution.resolved.len(),
        resolution.user_id
    );
    for (currency, amount) in &resolution.credited {
        println!("  +{}", format_amount(*currency, *amount));
    }
    if let Some(notice) = &resolution.notice {
        println!("Notify user {}: {}", notice.user_id, notice.message);
    }
}

fn print_transactions(transactions: &[Transaction]) {
    println!(
        "{:<6} {:<20} {:<12} {:<18} {:>14} {:<9} REASON",
        "ID", "DATE", "USER", "KIND", "AMOUNT", "STATUS"
    );
    println!("{}", "-".repeat(96));
    for tx in transactions {
        println!(
            "{:<6} {:<20} {:<12} {:<18} {:>14} {:<9} {}",
            tx.id,
            tx.timestamp.format("%Y-%m-%d %H:%M:%S"),
            tx.user_id,
            tx.kind.as_str(),
            format_amount(tx.currency, tx.amount),
            tx.status.map(|s| s.as_str()).unwrap_or("-"),
            truncate(&tx.reason, 30)
        );
    }
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Accounts:         {}", report.account_count);
    println!("Transactions:     {}", report.transaction_count);
    println!("Pending deposits: {}", report.pending_count);
    println!("Open requests:    {}", report.open_request_count);
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    caller: Caller,
    export_type: &str,
    output: Option<String>,
    format: Option<String>,
) -> Result<()> {
    let writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create {}", path))?,
        ),
        None => Box::new(io::stdout()),
    };

    let exporter = Exporter::new(service, caller);
    let format = format.as_deref().unwrap_or(match export_type {
        "full" => "json",
        _ => "csv",
    });

    let count = match (export_type, format) {
        ("transactions", "csv") => exporter.export_transactions_csv(writer).await?,
        ("transactions", "json") => exporter.export_transactions_json(writer).await?,
        ("balances", "csv") => exporter.export_balances_csv(writer).await?,
        ("full", "json") => {
            let snapshot = exporter.export_full_json(writer).await?;
            snapshot.accounts.len() + snapshot.transactions.len()
        }
        _ => anyhow::bail!(
            "Unsupported export '{}' as '{}'. \
             Use transactions (csv|json), balances (csv) or full (json)",
            export_type,
            format
        ),
    };

    if let Some(path) = output {
        eprintln!("Exported {} record(s) to {}", count, path);
    }
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
