//! Key custody commands.

use anyhow::Result;
use clap::Subcommand;
use custos_core::custody::{CustodyEngine, TransferAction, TransferRequest};
use custos_core::identity::Role;

use super::{AppContext, require_role};

/// Key custody ledger operations.
#[derive(Subcommand, Debug)]
pub enum KeyCommand {
    /// Register new key units in a lockbox (creates the key if needed)
    Register {
        /// Key name
        name: String,

        /// Lockbox receiving the units
        #[arg(long)]
        lockbox: String,

        /// Number of units
        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },

    /// Sign key units out of a lockbox to a person
    #[command(alias = "out")]
    SignOut {
        /// Key name
        name: String,

        /// Person taking the keys
        #[arg(long)]
        person: String,

        /// Lockbox the keys come from
        #[arg(long)]
        lockbox: String,

        /// Number of units
        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },

    /// Sign key units back in from a person to a lockbox
    #[command(alias = "in")]
    SignIn {
        /// Key name
        name: String,

        /// Person returning the keys
        #[arg(long)]
        person: String,

        /// Lockbox the keys go back to
        #[arg(long)]
        lockbox: String,

        /// Number of units
        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },

    /// Search assigned keys, lockboxes, and the transfer log
    Search {
        /// Query string (case-insensitive substring)
        query: String,
    },

    /// Merge legacy per-unit key documents into grouped holder lists
    Consolidate,
}

impl KeyCommand {
    /// Runs the command.
    pub async fn run(self, ctx: &AppContext) -> Result<()> {
        let engine = CustodyEngine::new(ctx.store.clone(), ctx.store_timeout);

        match self {
            Self::Register {
                name,
                lockbox,
                quantity,
            } => {
                require_role(&ctx.user, Role::Manager)?;
                let outcome = engine
                    .register_or_top_up(&name, &lockbox, quantity, &ctx.user)
                    .await?;
                println!(
                    "Registered {} x {} in {} (total now {})",
                    outcome.quantity_added, outcome.key_name, outcome.lockbox, outcome.total_quantity
                );
            },
            Self::SignOut {
                name,
                person,
                lockbox,
                quantity,
            } => {
                require_role(&ctx.user, Role::User)?;
                let request = TransferRequest {
                    key_name: name,
                    action: TransferAction::SigningOut,
                    person,
                    lockbox,
                    quantity,
                };
                let outcome = engine.transfer_custody(&request, &ctx.user).await?;
                print_transfer(&outcome);
            },
            Self::SignIn {
                name,
                person,
                lockbox,
                quantity,
            } => {
                require_role(&ctx.user, Role::User)?;
                let request = TransferRequest {
                    key_name: name,
                    action: TransferAction::SigningIn,
                    person,
                    lockbox,
                    quantity,
                };
                let outcome = engine.transfer_custody(&request, &ctx.user).await?;
                print_transfer(&outcome);
            },
            Self::Search { query } => {
                let results = engine.search(&query).await?;
                if results.assigned.is_empty()
                    && results.lockboxes.is_empty()
                    && results.history.is_empty()
                {
                    println!("No matches.");
                    return Ok(());
                }
                for entry in &results.assigned {
                    println!("assigned  {} x {} -> {}", entry.quantity, entry.key_name, entry.person);
                }
                for entry in &results.lockboxes {
                    println!("lockbox   {} x {} in {}", entry.quantity, entry.key_name, entry.lockbox);
                }
                for entry in &results.history {
                    println!(
                        "log       {} {} {} (person: {}, lockbox: {}, by {})",
                        entry.timestamp.format("%Y-%m-%d %H:%M"),
                        entry.action,
                        entry.key_name,
                        entry.person,
                        entry.lockbox,
                        entry.submitted_by
                    );
                }
            },
            Self::Consolidate => {
                require_role(&ctx.user, Role::Admin)?;
                let summary = engine.consolidate_legacy_holders(&ctx.user).await?;
                println!(
                    "Consolidated {} documents into {} keys",
                    summary.deleted_documents, summary.consolidated_keys
                );
            },
        }
        Ok(())
    }
}

fn print_transfer(outcome: &custos_core::custody::TransferOutcome) {
    println!("{} complete for {}", outcome.action, outcome.key_name);
    for holder in &outcome.holders {
        println!("  {} holds {}", holder.name(), holder.quantity());
    }
    if !outcome.log_recorded {
        eprintln!("warning: transfer log entry was not recorded");
    }
}
