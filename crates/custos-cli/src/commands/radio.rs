//! Radio assignment commands.

use anyhow::Result;
use clap::Subcommand;
use custos_core::identity::Role;
use custos_core::radio::{RadioEngine, SignOutRequest};

use super::{AppContext, require_role};

/// Radio assignment operations.
#[derive(Subcommand, Debug)]
pub enum RadioCommand {
    /// Add a radio to the inventory
    Add {
        /// Radio callsign
        callsign: String,

        /// Fleet number
        #[arg(long)]
        number: String,

        /// Serial number
        #[arg(long)]
        serial: String,
    },

    /// Sign a radio out to a person
    #[command(alias = "out")]
    SignOut {
        /// Radio document id
        radio_id: String,

        /// Person taking the radio
        #[arg(long)]
        person: String,

        /// Issue the surveillance kit
        #[arg(long)]
        surveillance_kit: bool,

        /// Issue the earpiece add-on (requires --surveillance-kit)
        #[arg(long)]
        earpiece: bool,
    },

    /// Sign a radio back in
    #[command(alias = "in")]
    SignIn {
        /// Radio document id
        radio_id: String,
    },

    /// Record replacement parts fitted during an assignment
    AddPart {
        /// Assignment document id
        assignment_id: String,

        /// Part descriptions
        #[arg(required = true)]
        parts: Vec<String>,
    },
}

impl RadioCommand {
    /// Runs the command.
    pub async fn run(self, ctx: &AppContext) -> Result<()> {
        let engine = RadioEngine::new(ctx.store.clone(), ctx.store_timeout);

        match self {
            Self::Add {
                callsign,
                number,
                serial,
            } => {
                require_role(&ctx.user, Role::Manager)?;
                let id = engine
                    .create_radio(&callsign, &number, &serial, &ctx.user)
                    .await?;
                println!("Added radio {callsign} ({id})");
            },
            Self::SignOut {
                radio_id,
                person,
                surveillance_kit,
                earpiece,
            } => {
                require_role(&ctx.user, Role::User)?;
                let request = SignOutRequest {
                    radio_id,
                    person_name: person,
                    surveillance_kit,
                    earpiece,
                };
                let outcome = engine.sign_out(&request, &ctx.user).await?;
                println!(
                    "Signed radio {} out to {}",
                    outcome.radio_id, outcome.person_name
                );
                match outcome.assignment_id {
                    Some(id) => println!("  assignment {id}"),
                    None => eprintln!("warning: assignment record was not created"),
                }
            },
            Self::SignIn { radio_id } => {
                require_role(&ctx.user, Role::User)?;
                let outcome = engine.sign_in(&radio_id, &ctx.user).await?;
                println!("Radio {} returned", outcome.radio_id);
                if !outcome.closed_assignment {
                    eprintln!("warning: no open assignment record was closed");
                }
            },
            Self::AddPart {
                assignment_id,
                parts,
            } => {
                require_role(&ctx.user, Role::User)?;
                let assignment = engine
                    .add_replacement_parts(&assignment_id, &parts, &ctx.user)
                    .await?;
                println!(
                    "Recorded {} part(s) on assignment for {}",
                    parts.len(),
                    assignment.person_name
                );
            },
        }
        Ok(())
    }
}
