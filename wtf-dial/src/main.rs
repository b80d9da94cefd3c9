//! wtf-dial - administrative command line for the dial service
//!
//! Every subcommand runs one service call against the configured database
//! and prints the result as JSON on stdout. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use wtf_common::config::TomlConfig;
use wtf_common::db::{init_database_with, DatabaseOptions, DialFilter, DialMembershipFilter, DialUpdate, DialValueFilter};
use wtf_common::{DialId, EventBus, UserId};
use wtf_dial::{DialService, RefreshOutcome, RequestContext};

/// Command-line arguments for wtf-dial
#[derive(Parser, Debug)]
#[command(name = "wtf-dial")]
#[command(about = "Shared WTF dials: create, join and set values")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "WTF_DIAL_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, env = "WTF_DIAL_DATABASE")]
    database: Option<PathBuf>,

    /// Act as this user
    #[arg(short, long, env = "WTF_DIAL_USER")]
    user: Option<UserId>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a dial owned by the current user
    Create { name: String },
    /// List the current user's dials
    List {
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        offset: Option<i64>,
    },
    /// Show one dial
    Show { dial_id: DialId },
    /// Rename a dial (owner only)
    Rename { dial_id: DialId, name: String },
    /// Delete a dial (owner only)
    Delete { dial_id: DialId },
    /// Join a dial by invite code
    Join { invite_code: String },
    /// Set the current user's value on a dial
    SetValue {
        dial_id: DialId,
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },
    /// Leave a dial
    Leave { dial_id: DialId },
    /// Recompute a dial's value from its memberships
    Recompute { dial_id: DialId },
    /// Per-minute value history of a dial
    History {
        dial_id: DialId,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// List a dial's members
    Members { dial_id: DialId },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<wtf_common::Error>() {
                Some(err) => eprintln!("error [{}]: {}", err.code(), err.user_message()),
                None => eprintln!("error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let (config, config_source) = TomlConfig::load_resolved(args.config.as_deref())?;
    init_tracing(&config.logging.level);
    config_source.log();

    info!(
        "Starting wtf-dial v{} ({:?})",
        env!("CARGO_PKG_VERSION"),
        args.command
    );

    let db_path = config.resolve_database_path(args.database.as_deref());
    info!("Database path: {}", db_path.display());

    let pool = init_database_with(&db_path, DatabaseOptions::from(&config))
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let bus = Arc::new(EventBus::new(config.event_bus_capacity));
    let service = DialService::new(pool.clone(), bus)
        .with_value_range(config.min_membership_value..=config.max_membership_value);

    let ctx = match args.user {
        Some(user_id) => RequestContext::for_user(user_id),
        None => RequestContext::anonymous(),
    };

    let result = execute(&service, &ctx, args.command).await;
    tracing::debug!(metrics = ?service.metrics().snapshot(), "Service counters");
    pool.close().await;
    result
}

async fn execute(service: &DialService, ctx: &RequestContext, command: Command) -> Result<()> {
    match command {
        Command::Create { name } => print_json(&service.create_dial(ctx, &name).await?),
        Command::List { limit, offset } => {
            let filter = DialFilter {
                limit,
                offset,
                ..DialFilter::default()
            };
            let (dials, total) = service.find_dials(ctx, &filter).await?;
            print_json(&serde_json::json!({ "dials": dials, "total": total }))
        }
        Command::Show { dial_id } => print_json(&service.find_dial_by_id(ctx, dial_id).await?),
        Command::Rename { dial_id, name } => {
            let upd = DialUpdate { name: Some(name) };
            print_json(&service.update_dial(ctx, dial_id, &upd).await?)
        }
        Command::Delete { dial_id } => {
            service.delete_dial(ctx, dial_id).await?;
            print_json(&serde_json::json!({ "deleted": dial_id }))
        }
        Command::Join { invite_code } => {
            print_json(&service.join_dial(ctx, &invite_code).await?)
        }
        Command::SetValue { dial_id, value } => {
            print_json(&service.set_my_membership_value(ctx, dial_id, value).await?)
        }
        Command::Leave { dial_id } => {
            service.leave_dial(ctx, dial_id).await?;
            print_json(&serde_json::json!({ "left": dial_id }))
        }
        Command::Recompute { dial_id } => {
            let outcome = service.recompute_dial_value(dial_id).await?;
            print_json(&outcome_json(dial_id, &outcome))
        }
        Command::History { dial_id, limit } => {
            let filter = DialValueFilter {
                limit,
                ..DialValueFilter::default()
            };
            print_json(&service.dial_history(ctx, dial_id, &filter).await?)
        }
        Command::Members { dial_id } => {
            let filter = DialMembershipFilter {
                dial_id: Some(dial_id),
                ..DialMembershipFilter::default()
            };
            let (members, total) = service.find_memberships(ctx, &filter).await?;
            print_json(&serde_json::json!({ "memberships": members, "total": total }))
        }
    }
}

fn outcome_json(dial_id: DialId, outcome: &RefreshOutcome) -> serde_json::Value {
    match outcome {
        RefreshOutcome::NotFound => serde_json::json!({ "dial_id": dial_id, "outcome": "not_found" }),
        RefreshOutcome::Unchanged { value } => {
            serde_json::json!({ "dial_id": dial_id, "outcome": "unchanged", "value": value })
        }
        RefreshOutcome::Changed {
            old_value,
            new_value,
            notified,
        } => serde_json::json!({
            "dial_id": dial_id,
            "outcome": "changed",
            "old_value": old_value,
            "new_value": new_value,
            "notified": notified.attempted,
        }),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// RUST_LOG wins over the configured level
fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
