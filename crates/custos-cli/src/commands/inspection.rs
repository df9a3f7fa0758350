//! Inspection commands.

use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use custos_core::identity::Role;
use custos_core::inspection::{ComponentSnapshot, InspectionEngine};

use super::{AppContext, require_role};

/// Component inspection operations.
#[derive(Subcommand, Debug)]
pub enum InspectionCommand {
    /// Add an inspectable component under an asset
    AddComponent {
        /// Parent asset id
        asset_id: String,

        /// Recurrence (monthly, quarterly, annually, 5-years)
        #[arg(long, default_value = "annually")]
        frequency: String,
    },

    /// Log an inspection for a component
    Record {
        /// Component document id
        component_id: String,

        /// Result (pass/fail/...; loose values are normalized)
        #[arg(long)]
        status: String,

        /// Free-text notes
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Show overdue, upcoming, and recently-checked components
    Due,
}

impl InspectionCommand {
    /// Runs the command.
    pub async fn run(self, ctx: &AppContext) -> Result<()> {
        let engine = InspectionEngine::new(ctx.store.clone(), ctx.store_timeout);

        match self {
            Self::AddComponent {
                asset_id,
                frequency,
            } => {
                require_role(&ctx.user, Role::Manager)?;
                let id = engine
                    .create_component(&asset_id, &frequency, &ctx.user)
                    .await?;
                println!("Added component {id} under {asset_id}");
            },
            Self::Record {
                component_id,
                status,
                notes,
            } => {
                require_role(&ctx.user, Role::Manager)?;
                let outcome = engine
                    .record_inspection(&component_id, &status, &notes, &ctx.user)
                    .await?;
                println!(
                    "Recorded {} for {}; next due {}",
                    outcome.status.as_str(),
                    outcome.component_id,
                    outcome.next_due.format("%Y-%m-%d")
                );
                if !outcome.record_written {
                    eprintln!("warning: inspection record was not written");
                }
            },
            Self::Due => {
                let buckets = engine.component_buckets(Utc::now()).await?;
                print_bucket("Overdue", &buckets.overdue);
                print_bucket("Upcoming (30 days)", &buckets.upcoming);
                print_bucket("Recently checked", &buckets.recent);
            },
        }
        Ok(())
    }
}

fn print_bucket(title: &str, snapshots: &[ComponentSnapshot]) {
    println!("{title}: {}", snapshots.len());
    for snapshot in snapshots {
        let due = snapshot
            .component
            .next_due
            .map_or_else(|| "never inspected".to_string(), |d| d.format("%Y-%m-%d").to_string());
        println!(
            "  {} (asset {}, {}, due {})",
            snapshot.id,
            snapshot.component.asset_id,
            snapshot.component.frequency.as_str(),
            due
        );
    }
}
