use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use treetap_common::models::NewAdvertisement;
use treetap_core::CoreConfig;

mod context;
use context::AppContext;

#[derive(Parser, Debug, Clone)]
#[command(name = "treetap")]
#[command(author, version, about = "Tree Tap - advertisement coupons that plant trees")]
struct Args {
    /// Postgres connection URL.
    #[arg(long, default_value = "postgres://treetap@localhost:5432/treetap")]
    database_url: String,

    /// Skip applying migrations on startup.
    #[arg(long)]
    no_migrate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Submit a new advertisement for review.
    Create {
        #[arg(long)]
        created_by: String,
        #[arg(long)]
        company_name: String,
        #[arg(long)]
        website: String,
        #[arg(long)]
        coupon_info: String,
        #[arg(long)]
        trees_per_click: i32,
        #[arg(long, default_value = "")]
        content: String,
        /// Blob storage reference for the advertisement image.
        #[arg(long)]
        image: Option<String>,
    },
    /// Approve an advertisement and seed its coupon pool (admin).
    Approve {
        #[arg(long)]
        actor: String,
        advertisement_id: Uuid,
        #[arg(long)]
        ngo: String,
        /// Comma separated coupon codes.
        #[arg(long, value_delimiter = ',')]
        codes: Vec<String>,
    },
    /// Stop redemptions on an advertisement (admin).
    Close {
        #[arg(long)]
        actor: String,
        advertisement_id: Uuid,
    },
    /// Accept redemptions again after a close (admin).
    Reopen {
        #[arg(long)]
        actor: String,
        advertisement_id: Uuid,
    },
    /// Append coupon codes to an advertisement's pool (admin).
    Refill {
        #[arg(long)]
        actor: String,
        advertisement_id: Uuid,
        #[arg(long, value_delimiter = ',', required = true)]
        codes: Vec<String>,
    },
    /// Redeem one coupon from an advertisement.
    Plant {
        #[arg(long)]
        user: String,
        advertisement_id: Uuid,
    },
    /// Trees planted, carbon credit and coupons held.
    Profile {
        #[arg(long)]
        user: String,
    },
    /// Approved advertisements as a user sees them.
    List {
        #[arg(long)]
        viewer: String,
        #[arg(long)]
        exclude_closed: bool,
    },
    /// Approved advertisements among the given ids.
    Lookup {
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
    /// Every advertisement regardless of state (admin).
    ListAll {
        #[arg(long)]
        actor: String,
    },
    /// Every coupon of an advertisement with its assignment (admin).
    Coupons {
        #[arg(long)]
        actor: String,
        advertisement_id: Uuid,
    },
}

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("treetap=info".parse()?);
    let sub = fmt().with_env_filter(filter).with_writer(std::io::stderr).finish();
    tracing::subscriber::set_global_default(sub).context("failed to set global subscriber")?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(ctx: &AppContext, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Create {
            created_by,
            company_name,
            website,
            coupon_info,
            trees_per_click,
            content,
            image,
        } => {
            let ad = ctx
                .advertisements
                .create_advertisement(NewAdvertisement {
                    company_name,
                    website,
                    coupon_info,
                    trees_per_click,
                    advertisement_content: content,
                    advertisement_image: image,
                    created_by,
                })
                .await?;
            print_json(&ad)
        }
        Command::Approve {
            actor,
            advertisement_id,
            ngo,
            codes,
        } => {
            let ad = ctx
                .advertisements
                .approve_advertisement(&actor, advertisement_id, &ngo, &codes)
                .await?;
            print_json(&ad)
        }
        Command::Close { actor, advertisement_id } => {
            ctx.advertisements.close_advertisement(&actor, advertisement_id).await?;
            print_json(&serde_json::json!({ "advertisement_id": advertisement_id, "closed": true }))
        }
        Command::Reopen { actor, advertisement_id } => {
            ctx.advertisements.reopen_advertisement(&actor, advertisement_id).await?;
            print_json(&serde_json::json!({ "advertisement_id": advertisement_id, "closed": false }))
        }
        Command::Refill {
            actor,
            advertisement_id,
            codes,
        } => {
            let accepted = ctx.advertisements.refill_coupons(&actor, advertisement_id, &codes).await?;
            print_json(&serde_json::json!({ "advertisement_id": advertisement_id, "accepted_count": accepted }))
        }
        Command::Plant { user, advertisement_id } => {
            let planted = ctx.redemption.plant_tree(advertisement_id, &user).await?;
            print_json(&planted)
        }
        Command::Profile { user } => print_json(&ctx.profiles.get_profile(&user).await?),
        Command::List { viewer, exclude_closed } => {
            print_json(&ctx.advertisements.list_public(&viewer, exclude_closed).await?)
        }
        Command::Lookup { ids } => print_json(&ctx.advertisements.list_by_ids(&ids).await?),
        Command::ListAll { actor } => print_json(&ctx.advertisements.list_all(&actor).await?),
        Command::Coupons { actor, advertisement_id } => {
            print_json(&ctx.advertisements.list_coupons(&actor, advertisement_id).await?)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let args = Args::parse();
    let config = CoreConfig::from_env().context("loading configuration")?;
    info!("Tree Tap starting. migrate={}", !args.no_migrate);

    let ctx = AppContext::new(&args.database_url, !args.no_migrate, config)
        .await
        .context("connecting to the database")?;

    let outcome = run(&ctx, args.command).await;
    ctx.shutdown().await;

    if let Err(e) = &outcome {
        error!("Command failed: {:#}", e);
    }
    outcome
}
