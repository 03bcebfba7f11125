//! listing-builder CLI entry point

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use listing_builder::api::ApiClient;
use listing_builder::auth::{AuthProvider, CredentialStore};
use listing_builder::listing::{parse_tags, Attachment, ListingForm};
use listing_builder::ui;
use listing_builder::workflow::SubmissionWorkflow;
use listing_builder::{config, Error};

#[derive(Parser)]
#[command(name = "listing-builder")]
#[command(about = "🛍  listing-builder - create draft digital-download listings")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the configuration file interactively
    Init,

    /// Authorize this tool with your marketplace account
    Login {
        /// Print the authorization URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Remove the stored access token
    Logout,

    /// Show configuration and login status
    Status,

    /// Create a draft listing and upload its files
    Submit(SubmitArgs),
}

#[derive(clap::Args)]
struct SubmitArgs {
    #[arg(long)]
    title: String,

    #[arg(long)]
    description: String,

    /// Comma-separated tags, at most 13
    #[arg(long, default_value = "")]
    tags: String,

    /// First preview image
    #[arg(long)]
    image1: Option<PathBuf>,

    /// Second preview image
    #[arg(long)]
    image2: Option<PathBuf>,

    /// Downloadable archive
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Primary color id, 0 for none
    #[arg(long, default_value = "1")]
    primary_color: String,

    /// Secondary color id, 0 for none
    #[arg(long, default_value = "10")]
    secondary_color: String,

    /// Holiday id, 0 for none
    #[arg(long, default_value = "1")]
    holiday: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            config::onboard()?;
            println!("\nNext steps:");
            println!("  1. listing-builder login");
            println!("  2. listing-builder submit --title ... --archive pack.zip");
        }

        Commands::Login { no_browser } => {
            run_login(!no_browser).await?;
        }

        Commands::Logout => {
            CredentialStore::from_file(config::credentials_path()).clear();
            ui::print_success("Logged out successfully");
        }

        Commands::Status => {
            let config = config::load()?;
            let auth = AuthProvider::from_config(&config);
            ui::print_header("Status");
            println!("Config: {:?}", config::config_path());
            println!("Client id: {}", if config.client_id.is_empty() { "not set" } else { "✓" });
            println!("Redirect URI: {}", config.redirect_uri);
            println!("API: {}", config.api_base_url);
            println!(
                "Access token: {}",
                if auth.credentials().is_logged_in() { "✓" } else { "not set (run 'listing-builder login')" }
            );
        }

        Commands::Submit(args) => {
            run_submit(args).await?;
        }
    }

    Ok(())
}

async fn run_login(open_browser: bool) -> Result<()> {
    let config = config::load()?;
    let auth = AuthProvider::from_config(&config);

    match auth.login(open_browser).await {
        Ok(_) => {
            ui::print_success("Authentication successful!");
            println!("  Token saved to {:?}", config::credentials_path());
            Ok(())
        }
        Err(e) => {
            ui::print_error(&format!("Authorization failed: {}", e));
            let message = e.to_string().to_lowercase();
            if message.contains("redirect") && message.contains("permitted") {
                ui::print_warning(&format!(
                    "The callback URL registered for your app must match '{}' exactly.",
                    config.redirect_uri
                ));
            }
            Err(e.into())
        }
    }
}

async fn run_submit(args: SubmitArgs) -> Result<()> {
    let config = config::load()?;
    let auth = AuthProvider::from_config(&config);
    let api = ApiClient::new(&config);

    let form = ListingForm {
        title: args.title,
        description: args.description,
        primary_color_id: args.primary_color,
        secondary_color_id: args.secondary_color,
        holiday_id: args.holiday,
        tags: parse_tags(&args.tags),
        image1: load_attachment(args.image1.as_deref()).await?,
        image2: load_attachment(args.image2.as_deref()).await?,
        archive: load_attachment(args.archive.as_deref()).await?,
    };

    ui::print_header("Submit listing");
    let spinner = ui::Spinner::new();
    let mut workflow = SubmissionWorkflow::new(&api, auth.credentials());

    match workflow.submit(form, &spinner).await {
        Ok(listing_id) => {
            drop(spinner);
            println!("  Listing {} is saved as a draft. Review and publish it from your shop manager.", listing_id);
            Ok(())
        }
        Err(e) => {
            drop(spinner);
            ui::print_error(&e.to_string());
            match &e {
                Error::Submission(failure) if failure.auth_expired => {
                    ui::print_step("Run 'listing-builder login' and submit again.");
                }
                Error::Submission(failure) => {
                    if let Some(listing_id) = failure.draft_listing_id {
                        ui::print_warning(&format!(
                            "Draft listing {} was created but is incomplete.",
                            listing_id
                        ));
                    }
                }
                _ => {}
            }
            Err(e.into())
        }
    }
}

async fn load_attachment(path: Option<&Path>) -> Result<Option<Attachment>> {
    match path {
        Some(path) => Ok(Some(Attachment::from_path(path).await?)),
        None => Ok(None),
    }
}
