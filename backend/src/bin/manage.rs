//! `manage` — operator tooling for records the HTTP API does not expose.
//!
//! Users come from the external identity provider and groups are curated by
//! staff, so both are provisioned here rather than over REST.

use anyhow::bail;
use blog_api::{
    config::AppConfig,
    db::{self, NewGroup, NewUser},
};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "manage", about = "Blog API management commands")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending database migrations.
    Migrate,

    /// Register a user.
    CreateUser { username: String },

    /// Delete a user with all of their posts, comments and follows.
    DeleteUser { username: String },

    /// Allow or block a user's tokens.
    SetActive {
        username: String,
        #[arg(long, action = clap::ArgAction::Set)]
        active: bool,
    },

    /// Create a group posts can be filed under.
    CreateGroup {
        #[arg(long)]
        title: String,
        #[arg(long)]
        slug: String,
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Delete a group. Its posts are kept without a group.
    DeleteGroup { slug: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blog_api=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = AppConfig::load()?;
    // Schema changes only ever happen through the explicit subcommand.
    settings.database.run_migrations = false;
    let pool = db::setup_database(&settings).await?;

    match cli.command {
        Commands::Migrate => db::migrate(&pool).await?,
        Commands::CreateUser { username } => {
            let user = db::create_user(&pool, NewUser { username }).await?;
            println!("Created user {} (id {})", user.username, user.id);
        }
        Commands::DeleteUser { username } => {
            if !db::delete_user(&pool, &username).await? {
                bail!("no user named {username}");
            }
            println!("Deleted user {username}");
        }
        Commands::SetActive { username, active } => {
            if !db::set_user_active(&pool, &username, active).await? {
                bail!("no user named {username}");
            }
            println!("User {username} active: {active}");
        }
        Commands::CreateGroup {
            title,
            slug,
            description,
        } => {
            let group = db::create_group(
                &pool,
                NewGroup {
                    title,
                    slug,
                    description,
                },
            )
            .await?;
            println!("Created group {} (id {})", group.slug, group.id);
        }
        Commands::DeleteGroup { slug } => {
            if !db::delete_group(&pool, &slug).await? {
                bail!("no group with slug {slug}");
            }
            println!("Deleted group {slug}");
        }
    }

    Ok(())
}
