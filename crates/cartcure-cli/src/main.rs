//! `cartcure` command-line front end.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use cartcure::commands::{self, CommandOutcome};
use cartcure::config::settings::KNOWN_KEYS;
use cartcure::config::{default_config_path, load_config, AppConfig, BillingConfig};
use cartcure::db::{default_database_path, settings_repo, Database};
use cartcure::{
    ClientContact, DailyScheduler, LifecycleEngine, LogNotifier, Notifier, SmtpNotifier,
    Submission, SystemClock,
};

#[derive(Parser, Debug)]
#[command(name = "cartcure", version, about = "Job and billing lifecycle engine")]
struct Cli {
    /// Path to the JSON config file. Defaults to ~/.cartcure/config.json.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a job from an intake submission.
    Intake {
        submission: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        store: Option<String>,
        #[arg(long)]
        description: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Price a job and send the quote.
    Quote {
        job: String,
        /// Amount excluding GST.
        amount: Decimal,
        #[arg(long)]
        turnaround_days: Option<u32>,
    },
    Accept {
        job: String,
    },
    Decline {
        job: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
    Start {
        job: String,
    },
    Hold {
        job: String,
        #[arg(long)]
        reason: String,
    },
    Resume {
        job: String,
    },
    Complete {
        job: String,
    },
    Cancel {
        job: String,
        #[arg(long, default_value = "")]
        reason: String,
        #[arg(long)]
        refund: bool,
    },
    /// Raise the next invoice the billing rules call for.
    NextInvoice {
        job: String,
    },
    SendInvoice {
        invoice: String,
    },
    MarkPaid {
        invoice: String,
        #[arg(long)]
        method: String,
        #[arg(long)]
        reference: Option<String>,
    },
    CancelInvoice {
        invoice: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Show a job and its invoices.
    Show {
        job: String,
    },
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Run scheduler policies once.
    Schedule {
        #[arg(value_enum, default_value_t = Policy::All)]
        policy: Policy,
        /// With `all`, run even if today's pass already happened.
        #[arg(long)]
        force: bool,
    },
    /// Run the daily scheduler until interrupted.
    Daemon,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    Get { name: String },
    Set { name: String, value: String },
    List,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Policy {
    Quote,
    PreDue,
    Overdue,
    Sla,
    All,
}

fn main() {
    let cli = Cli::parse();
    cartcure::logging::init(&cli.log_level, cli.log_json);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

/// Returns whether the command succeeded.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let config_path = cli
        .config
        .clone()
        .or_else(default_config_path)
        .ok_or_else(|| anyhow!("could not determine the home directory; pass --config"))?;
    let config = load_config(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    let engine = build_engine(&config)?;
    let json = cli.json;

    let success = match cli.command {
        Command::Intake {
            submission,
            name,
            email,
            phone,
            store,
            description,
            category,
        } => {
            let submission = Submission {
                submission_number: submission,
                client: ClientContact { name, email, phone },
                store_reference: store,
                description,
                category,
            };
            print_outcome(json, commands::create_job(&engine, &submission))
        }
        Command::Quote {
            job,
            amount,
            turnaround_days,
        } => print_outcome(
            json,
            commands::send_quote(&engine, &job, amount, turnaround_days),
        ),
        Command::Accept { job } => print_outcome(json, commands::accept_quote(&engine, &job)),
        Command::Decline { job, reason } => {
            print_outcome(json, commands::decline_quote(&engine, &job, &reason))
        }
        Command::Start { job } => print_outcome(json, commands::start_work(&engine, &job)),
        Command::Hold { job, reason } => {
            print_outcome(json, commands::put_on_hold(&engine, &job, &reason))
        }
        Command::Resume { job } => print_outcome(json, commands::resume_work(&engine, &job)),
        Command::Complete { job } => print_outcome(json, commands::complete_job(&engine, &job)),
        Command::Cancel {
            job,
            reason,
            refund,
        } => print_outcome(json, commands::cancel_job(&engine, &job, &reason, refund)),
        Command::NextInvoice { job } => {
            print_outcome(json, commands::generate_next_invoice(&engine, &job))
        }
        Command::SendInvoice { invoice } => {
            print_outcome(json, commands::send_invoice(&engine, &invoice))
        }
        Command::MarkPaid {
            invoice,
            method,
            reference,
        } => print_outcome(
            json,
            commands::mark_invoice_paid(&engine, &invoice, &method, reference.as_deref()),
        ),
        Command::CancelInvoice { invoice, reason } => {
            print_outcome(json, commands::cancel_invoice(&engine, &invoice, &reason))
        }
        Command::Show { job } => show_job(&engine, &job)?,
        Command::Settings { action } => settings(&engine, action)?,
        Command::Schedule { policy, force } => schedule(engine, &config, policy, force, json)?,
        Command::Daemon => daemon(engine, &config)?,
    };

    Ok(success)
}

fn build_engine(config: &AppConfig) -> anyhow::Result<LifecycleEngine> {
    let db_path = config
        .database_path
        .as_ref()
        .map(PathBuf::from)
        .or_else(default_database_path)
        .ok_or_else(|| anyhow!("no database_path configured and no home directory found"))?;
    let db = Database::open(&db_path)
        .with_context(|| format!("opening database at {}", db_path.display()))?;
    let billing = BillingConfig::load(&db)?;

    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpNotifier::from_config(smtp)?),
        None => {
            warn!("No SMTP settings configured, outbound email will only be logged");
            Arc::new(LogNotifier)
        }
    };

    Ok(LifecycleEngine::new(
        db,
        notifier,
        Arc::new(SystemClock),
        billing,
        config.business.clone(),
    ))
}

fn print_outcome<T: Serialize>(json: bool, outcome: CommandOutcome<T>) -> bool {
    if json {
        match serde_json::to_string_pretty(&outcome) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to serialize result: {}", e),
        }
    } else if outcome.success {
        println!("{}", outcome.message);
    } else {
        eprintln!("{}", outcome.message);
    }
    outcome.success
}

fn show_job(engine: &LifecycleEngine, job_number: &str) -> anyhow::Result<bool> {
    let job = match engine.job(job_number) {
        Ok(job) => job,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Ok(false);
        }
    };
    let invoices = engine.invoices_for_job(job_number)?;
    let sla = job.sla(engine.now());
    let view = serde_json::json!({
        "job": job,
        "sla": sla,
        "invoices": invoices,
    });
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(true)
}

fn settings(engine: &LifecycleEngine, action: SettingsAction) -> anyhow::Result<bool> {
    let db = engine.database();
    match action {
        SettingsAction::Get { name } => {
            match db.with_conn(|conn| settings_repo::get(conn, &name))? {
                Some(value) => println!("{}", value),
                None => {
                    eprintln!("{} is not set", name);
                    return Ok(false);
                }
            }
        }
        SettingsAction::Set { name, value } => {
            if !KNOWN_KEYS.contains(&name.as_str()) {
                warn!(name = %name, "Not a recognised billing setting; storing anyway");
            }
            let now = engine.now();
            db.with_conn(|conn| settings_repo::set(conn, &name, &value, now))?;
            println!("{} = {}", name, value);
        }
        SettingsAction::List => {
            for (name, value) in db.with_conn(settings_repo::all)? {
                println!("{} = {}", name, value);
            }
        }
    }
    Ok(true)
}

fn schedule(
    engine: LifecycleEngine,
    config: &AppConfig,
    policy: Policy,
    force: bool,
    json: bool,
) -> anyhow::Result<bool> {
    let now = engine.now();
    let outcome = match policy {
        Policy::Quote => commands::run_quote_reminders(&engine, now),
        Policy::PreDue => {
            warn!("Pre-due reminders re-send on every run; run them at most once a day");
            commands::run_pre_due_reminders(&engine, now)
        }
        Policy::Overdue => commands::run_overdue_notices(&engine, now),
        Policy::Sla => commands::refresh_sla(&engine, now),
        Policy::All => {
            let scheduler = DailyScheduler::new(
                Arc::new(engine),
                config.scheduler.run_hour,
                Duration::from_secs(config.scheduler.check_interval_secs),
            );
            return match scheduler.run_if_due(force)? {
                Some(report) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    } else {
                        for p in &report.policies {
                            println!(
                                "{}: {} processed, {} sent, {} updated, {} skipped, {} failed",
                                p.policy, p.processed, p.sent, p.updated, p.skipped, p.failed
                            );
                        }
                    }
                    Ok(report.policies.iter().all(|p| p.error.is_none()))
                }
                None => {
                    println!("Today's pass already ran or is not due yet (use --force to run now)");
                    Ok(true)
                }
            };
        }
    };
    Ok(print_outcome(json, outcome))
}

fn daemon(engine: LifecycleEngine, config: &AppConfig) -> anyhow::Result<bool> {
    let scheduler = DailyScheduler::new(
        Arc::new(engine),
        config.scheduler.run_hour,
        Duration::from_secs(config.scheduler.check_interval_secs.max(1)),
    );

    let (stop_tx, stop_rx) = std::sync::mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("installing Ctrl-C handler")?;

    let (trigger_tx, trigger_rx) = tokio::sync::broadcast::channel(4);
    let handle = scheduler.start(trigger_rx);
    info!(
        run_hour = config.scheduler.run_hour,
        "Scheduler running, press Ctrl-C to stop"
    );

    let _ = stop_rx.recv();
    info!("Shutting down scheduler");
    scheduler.stop();
    let _ = trigger_tx.send(());
    handle
        .join()
        .map_err(|_| anyhow!("scheduler thread panicked"))?;
    Ok(true)
}
