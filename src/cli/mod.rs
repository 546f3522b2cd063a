use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use crate::application::{
    CashbookService, EntryMeta, EntryPatch, NettingOutcome, SummaryPeriod,
};
use crate::domain::{format_rupees, parse_rupees, Direction, ProofType};
use crate::io::Exporter;
use crate::storage::EntryFilter;

/// Saldo - Small-Business Cashbook
#[derive(Parser)]
#[command(name = "saldo")]
#[command(about = "A local-first cashbook that nets offsetting entries per counterparty")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "saldo.db")]
    pub database: String,

    /// Business (tenant) identifier
    #[arg(short, long, default_value_t = 1)]
    pub business: i64,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct RecordArgs {
    /// Amount (e.g. "500", "1,250.50")
    pub amount: String,

    /// Counterparty name
    pub name: String,

    /// Counterparty contact number (entries net per contact)
    #[arg(short, long)]
    pub contact: String,

    /// Short title for the entry
    #[arg(short, long)]
    pub title: Option<String>,

    /// Entry date (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    pub date: Option<String>,

    /// Proof type: receipt, invoice, bank_statement, other
    #[arg(long)]
    pub proof: Option<String>,

    /// Proof description
    #[arg(long)]
    pub proof_note: Option<String>,

    /// Flag this entry for the reminder subsystem (out entries only)
    #[arg(long)]
    pub reminder: bool,

    /// Custom reminder message
    #[arg(long)]
    pub reminder_message: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Record money received from a counterparty
    In(RecordArgs),

    /// Record money given to a counterparty
    Out(RecordArgs),

    /// List entries
    Entries {
        /// Filter by direction: in, out
        #[arg(long)]
        direction: Option<String>,

        /// Filter by counterparty contact number
        #[arg(long)]
        contact: Option<String>,

        /// Filter from entry date (YYYY-MM-DD)
        #[arg(long)]
        from_date: Option<String>,

        /// Filter to entry date (YYYY-MM-DD)
        #[arg(long)]
        to_date: Option<String>,

        /// Maximum number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show a counterparty's open entries and net position
    Contact {
        /// Counterparty contact number
        contact: String,
    },

    /// Edit an entry (changing amount or direction re-runs netting)
    Edit {
        /// Entry ID
        id: String,

        /// New amount
        #[arg(short, long)]
        amount: Option<String>,

        /// New direction: in, out
        #[arg(long)]
        direction: Option<String>,

        /// New counterparty name
        #[arg(long)]
        name: Option<String>,

        /// New title
        #[arg(short, long)]
        title: Option<String>,

        /// New entry date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete an entry (no netting)
    Delete {
        /// Entry ID
        id: String,
    },

    /// Manually net exact-amount pairs, for one counterparty or all
    Net {
        /// Counterparty contact number (omit to net every counterparty)
        #[arg(short, long)]
        contact: Option<String>,
    },

    /// Show totals and balance
    Summary {
        /// Period: today, week, month, year, all
        #[arg(short, long, default_value = "all")]
        period: String,
    },

    /// List "out" entries flagged for reminders
    Reminders,

    /// Verify cashbook integrity
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: entries, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                CashbookService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::In(args) => {
                let service = CashbookService::connect(&self.database).await?;
                run_record_command(&service, self.business, Direction::In, args).await?;
            }

            Commands::Out(args) => {
                let service = CashbookService::connect(&self.database).await?;
                run_record_command(&service, self.business, Direction::Out, args).await?;
            }

            Commands::Entries {
                direction,
                contact,
                from_date,
                to_date,
                limit,
            } => {
                let service = CashbookService::connect(&self.database).await?;
                run_entries_command(
                    &service,
                    self.business,
                    direction,
                    contact,
                    from_date,
                    to_date,
                    limit,
                )
                .await?;
            }

            Commands::Contact { contact } => {
                let service = CashbookService::connect(&self.database).await?;
                run_contact_command(&service, self.business, &contact).await?;
            }

            Commands::Edit {
                id,
                amount,
                direction,
                name,
                title,
                date,
            } => {
                let service = CashbookService::connect(&self.database).await?;
                run_edit_command(
                    &service,
                    self.business,
                    &id,
                    amount,
                    direction,
                    name,
                    title,
                    date,
                )
                .await?;
            }

            Commands::Delete { id } => {
                let service = CashbookService::connect(&self.database).await?;
                let entry_id =
                    Uuid::parse_str(&id).context("Invalid entry ID format (expected UUID)")?;
                service.delete_entry(self.business, entry_id).await?;
                println!("Deleted entry: {}", id);
            }

            Commands::Net { contact } => {
                let service = CashbookService::connect(&self.database).await?;
                run_net_command(&service, self.business, contact.as_deref()).await?;
            }

            Commands::Summary { period } => {
                let service = CashbookService::connect(&self.database).await?;
                let period = SummaryPeriod::from_str(&period).ok_or_else(|| {
                    anyhow::anyhow!(
                        "Invalid period '{}'. Valid periods: today, week, month, year, all",
                        period
                    )
                })?;
                run_summary_command(&service, self.business, period).await?;
            }

            Commands::Reminders => {
                let service = CashbookService::connect(&self.database).await?;
                run_reminders_command(&service, self.business).await?;
            }

            Commands::Check => {
                let service = CashbookService::connect(&self.database).await?;
                run_check_command(&service, self.business).await?;
            }

            Commands::Export {
                export_type,
                output,
            } => {
                let service = CashbookService::connect(&self.database).await?;
                run_export_command(&service, self.business, &export_type, output.as_deref())
                    .await?;
            }
        }

        Ok(())
    }
}

/// Parse a YYYY-MM-DD date argument.
fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))
}

fn parse_direction(s: &str) -> Result<Direction> {
    Direction::from_str(s)
        .ok_or_else(|| anyhow::anyhow!("Invalid direction '{}'. Valid directions: in, out", s))
}

async fn run_record_command(
    service: &CashbookService,
    business: i64,
    direction: Direction,
    args: RecordArgs,
) -> Result<()> {
    let amount = parse_rupees(&args.amount).context("Invalid amount format. Use '500' or '500.00'")?;

    let entry_date = match args.date {
        Some(date_str) => parse_date(&date_str)?,
        None => Utc::now().date_naive(),
    };

    let mut meta = EntryMeta::new(args.name, entry_date);
    meta.title = args.title;
    if let Some(proof) = args.proof {
        meta.proof_type = Some(ProofType::from_str(&proof).ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid proof type '{}'. Valid types: receipt, invoice, bank_statement, other",
                proof
            )
        })?);
        meta.proof_description = args.proof_note;
    }
    meta.reminder_enabled = args.reminder;
    meta.reminder_message = args.reminder_message;

    let outcome = service
        .record_entry(business, direction, amount, &args.contact, meta)
        .await?;
    print_netting_outcome(&outcome, direction, amount);
    Ok(())
}

fn print_netting_outcome(outcome: &NettingOutcome, direction: Direction, amount: i64) {
    let netted = outcome.deleted.len() + outcome.updated.len();

    match &outcome.entry {
        Some(entry) if netted == 0 => {
            println!(
                "Recorded: {} {} for {} ({})",
                format_rupees(entry.amount_paise),
                entry.direction,
                entry.counterparty,
                entry.id
            );
        }
        Some(entry) => {
            println!(
                "Netted {} against {} opposite entries ({} deleted, {} reduced).",
                format_rupees(amount),
                netted,
                outcome.deleted.len(),
                outcome.updated.len()
            );
            println!(
                "Remaining on the books: {} {} ({})",
                format_rupees(entry.amount_paise),
                entry.direction,
                entry.id
            );
        }
        None => {
            println!(
                "Fully netted: {} {} absorbed by {} opposite entries ({} deleted, {} reduced). No entry created.",
                format_rupees(amount),
                direction,
                netted,
                outcome.deleted.len(),
                outcome.updated.len()
            );
        }
    }
}

async fn run_entries_command(
    service: &CashbookService,
    business: i64,
    direction: Option<String>,
    contact: Option<String>,
    from_date: Option<String>,
    to_date: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    let filter = EntryFilter {
        direction: direction.as_deref().map(parse_direction).transpose()?,
        counterparty: contact,
        from_date: from_date.as_deref().map(parse_date).transpose()?,
        to_date: to_date.as_deref().map(parse_date).transpose()?,
        limit,
    };

    let entries = service.list_entries(business, filter).await?;
    if entries.is_empty() {
        println!("No entries found.");
        return Ok(());
    }

    println!(
        "{:<36} {:<4} {:>14} {:<14} {:<12} {:<20}",
        "ID", "DIR", "AMOUNT", "CONTACT", "DATE", "NAME"
    );
    println!("{}", "-".repeat(104));
    for entry in entries {
        println!(
            "{:<36} {:<4} {:>14} {:<14} {:<12} {:<20}",
            entry.id,
            entry.direction,
            format_rupees(entry.amount_paise),
            entry.counterparty,
            entry.entry_date,
            entry.name
        );
    }
    Ok(())
}

async fn run_contact_command(service: &CashbookService, business: i64, contact: &str) -> Result<()> {
    let (entries, position) = service.counterparty_position(business, contact).await?;

    if entries.is_empty() {
        println!("No open entries for {}.", contact);
        return Ok(());
    }

    println!("Open entries for {} (oldest first):", contact);
    for entry in &entries {
        println!(
            "  {} {:<4} {:>14}  {} {}",
            entry.id,
            entry.direction,
            format_rupees(entry.amount_paise),
            entry.entry_date,
            entry.title.as_deref().unwrap_or("")
        );
    }
    println!();
    if position >= 0 {
        println!("Net position: {} to receive", format_rupees(position));
    } else {
        println!("Net position: {} to pay", format_rupees(-position));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_edit_command(
    service: &CashbookService,
    business: i64,
    id: &str,
    amount: Option<String>,
    direction: Option<String>,
    name: Option<String>,
    title: Option<String>,
    date: Option<String>,
) -> Result<()> {
    let entry_id = Uuid::parse_str(id).context("Invalid entry ID format (expected UUID)")?;

    let patch = EntryPatch {
        amount_paise: amount
            .as_deref()
            .map(parse_rupees)
            .transpose()
            .context("Invalid amount format")?,
        direction: direction.as_deref().map(parse_direction).transpose()?,
        name,
        title,
        entry_date: date.as_deref().map(parse_date).transpose()?,
        ..Default::default()
    };

    let outcome = service.update_entry(business, entry_id, patch).await?;
    let netted = outcome.deleted.len() + outcome.updated.len();

    match &outcome.entry {
        Some(entry) if netted == 0 => {
            println!("Updated entry: {}", entry.id);
        }
        Some(entry) => {
            println!(
                "Updated and netted against {} opposite entries ({} deleted, {} reduced).",
                netted,
                outcome.deleted.len(),
                outcome.updated.len()
            );
            println!(
                "Entry now holds {} {}",
                format_rupees(entry.amount_paise),
                entry.direction
            );
        }
        None => {
            println!(
                "Updated entry was fully netted and removed ({} opposite entries deleted, {} reduced).",
                outcome.deleted.len(),
                outcome.updated.len()
            );
        }
    }
    Ok(())
}

async fn run_net_command(
    service: &CashbookService,
    business: i64,
    contact: Option<&str>,
) -> Result<()> {
    match contact {
        Some(contact) => {
            let report = service.net_counterparty(business, contact).await?;
            println!(
                "Manual netting completed for {}: {} pairs netted, {} entries deleted.",
                contact, report.netted_pairs, report.deleted_entries
            );
        }
        None => {
            let reports = service.net_all(business).await?;
            if reports.is_empty() {
                println!("No counterparty has entries in both directions; nothing to net.");
                return Ok(());
            }
            for report in &reports {
                match &report.result {
                    Ok(net) => println!(
                        "{}: {} pairs netted, {} entries deleted",
                        report.counterparty, net.netted_pairs, net.deleted_entries
                    ),
                    Err(e) => println!("{}: FAILED ({})", report.counterparty, e),
                }
            }
        }
    }
    Ok(())
}

async fn run_summary_command(
    service: &CashbookService,
    business: i64,
    period: SummaryPeriod,
) -> Result<()> {
    let summary = service.summary(business, period).await?;

    println!(
        "Total in:   {} ({} entries)",
        format_rupees(summary.total_in),
        summary.entries_in
    );
    println!(
        "Total out:  {} ({} entries)",
        format_rupees(summary.total_out),
        summary.entries_out
    );
    println!("Balance:    {}", format_rupees(summary.balance()));
    Ok(())
}

async fn run_reminders_command(service: &CashbookService, business: i64) -> Result<()> {
    let entries = service.reminder_entries(business).await?;
    if entries.is_empty() {
        println!("No entries flagged for reminders.");
        return Ok(());
    }

    for entry in entries {
        println!(
            "{} {:>14} {} ({})",
            entry.counterparty,
            format_rupees(entry.amount_paise),
            entry.name,
            entry
                .reminder_message
                .as_deref()
                .unwrap_or("no custom message")
        );
    }
    Ok(())
}

async fn run_check_command(service: &CashbookService, business: i64) -> Result<()> {
    let stats = service.check_integrity(business).await?;

    println!("Entries:               {}", stats.entry_count);
    println!("Invalid amounts:       {}", stats.invalid_amounts);
    println!("Missing counterparties: {}", stats.missing_counterparties);
    println!("Duplicate sequences:   {}", stats.duplicate_sequences);
    println!();
    if stats.is_clean() {
        println!("Cashbook integrity: OK");
    } else {
        println!("Cashbook integrity: PROBLEMS FOUND");
    }
    Ok(())
}

async fn run_export_command(
    service: &CashbookService,
    business: i64,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    let exporter = Exporter::new(service);

    let writer: Box<dyn std::io::Write> = match output {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout()),
    };

    match export_type {
        "entries" => {
            let count = exporter.export_entries_csv(business, writer).await?;
            eprintln!("Exported {} entries", count);
        }
        "full" => {
            let snapshot = exporter.export_full_json(business, writer).await?;
            eprintln!("Exported {} entries (full snapshot)", snapshot.entries.len());
        }
        other => {
            anyhow::bail!("Invalid export type '{}'. Valid types: entries, full", other);
        }
    }
    Ok(())
}
