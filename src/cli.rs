use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Args, Subcommand};

use crate::{
    credentials::CredentialStore,
    dashboard::Dashboard,
    models::CheckoutLinkWithShortUrl,
    remote::{DEFAULT_POLAR_API_URL, PolarClient, ProxyClient},
    short_urls::ShortUrlCache,
    store::{FileStore, KeyValueStore},
};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the Dub proxy
    Serve(ServeArgs),
    /// Validate and save the Polar and Dub tokens
    Configure {
        #[arg(long, env = "POLAR_TOKEN", hide_env_values = true)]
        polar_token: String,
        #[arg(long, env = "DUB_TOKEN", hide_env_values = true)]
        dub_token: String,
    },
    /// Fetch checkout links and show them with their short URLs
    Links,
    /// Create a short URL for one checkout link
    Shorten {
        link_id: String,
        #[arg(long, help = "Create a new short URL even if one is already stored")]
        force: bool,
    },
    /// Forget the stored short URL of one checkout link
    Forget { link_id: String },
    /// Show link counts
    Stats,
    /// Remove the saved tokens and every stored short URL
    Reset,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, default_value_t = 3001, help = "Port to listen on", env = "PORT")]
    pub port: u16,

    #[arg(long, help = "Allowed CORS origin, any origin if unset", env = "FRONTEND_URL")]
    pub frontend_url: Option<String>,

    #[arg(long, default_value_t = String::from(dub_rs::DEFAULT_API_URL), env = "DUB_API_URL")]
    pub dub_api_url: String,
}

/// Settings shared by every dashboard command.
#[derive(Debug)]
pub struct Session {
    pub data_dir: PathBuf,
    pub polar_api_url: String,
    pub proxy_url: String,
    pub timeout: Duration,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".polar-dub"),
            polar_api_url: DEFAULT_POLAR_API_URL.to_string(),
            proxy_url: String::from("http://localhost:3001"),
            timeout: Duration::from_secs(30),
        }
    }
}

impl Session {
    fn store(&self) -> Arc<FileStore> {
        let store = Arc::new(FileStore::new(self.data_dir.join("store.json")));
        tracing::debug!(path = %store.path().display(), "opening store");
        store
    }

    pub async fn open(&self) -> anyhow::Result<Dashboard> {
        let store = self.store();

        let source = PolarClient::new(&self.polar_api_url, self.timeout)
            .context("Could not build Polar client.")?;
        let shortener = ProxyClient::new(&self.proxy_url, self.timeout)
            .context("Could not build proxy client.")?;

        Ok(Dashboard::open(
            CredentialStore::new(store.clone()),
            ShortUrlCache::new(store),
            Arc::new(source),
            Arc::new(shortener),
        )
        .await?)
    }
}

pub async fn run(command: Command, session: &Session) -> anyhow::Result<()> {
    let dashboard = session.open().await?;

    match command {
        Command::Serve(_) => anyhow::bail!("serve is not a dashboard command"),
        Command::Configure {
            polar_token,
            dub_token,
        } => {
            dashboard.configure(&polar_token, &dub_token).await?;
            println!("Tokens configured successfully!");
        }
        Command::Links => {
            let summary = dashboard.refresh().await?;
            println!("{}", summary.message());
            print_links(&dashboard.links().await);
        }
        Command::Shorten { link_id, force } => {
            dashboard.refresh().await?;

            match dashboard.short_url(&link_id).await {
                Some(short_url) if !force => {
                    println!("{short_url} (already created, use --force for a new one)");
                }
                _ => {
                    let short_url = dashboard.create_short_url(&link_id).await?;
                    println!("Short URL created successfully!");
                    println!("{short_url}");
                }
            }
        }
        Command::Forget { link_id } => {
            dashboard.forget_short_url(&link_id).await;
            println!("Forgot short URL of {link_id}");
        }
        Command::Stats => {
            dashboard.refresh().await?;
            let stats = dashboard.stats().await;
            println!("Total Checkout Links: {}", stats.total);
            println!("Short URLs Created:   {}", stats.with_short_url);
            println!("Remaining Links:      {}", stats.remaining);
            println!("Stored Short URLs:    {}", stats.stored);
        }
        Command::Reset => {
            dashboard.reset().await?;
            // also drops whatever else is left in the file, corrupt or not
            session
                .store()
                .clear()
                .await
                .context("Could not clear the store file.")?;
            println!("Configuration reset");
        }
    }

    Ok(())
}

fn print_links(links: &[CheckoutLinkWithShortUrl]) {
    if links.is_empty() {
        println!("No checkout links found");
        return;
    }

    println!(
        "{:<38} {:<24} {:<12} {:<32} URL",
        "ID", "PRODUCT", "CREATED", "SHORT URL"
    );

    for entry in links {
        let link = &entry.link;
        let product = link
            .label
            .as_deref()
            .or(link.product.as_ref().map(|p| p.name.as_str()))
            .unwrap_or("-");

        println!(
            "{:<38} {:<24} {:<12} {:<32} {}",
            link.id,
            product,
            link.created_at.format("%b %-d, %Y"),
            entry.short_url.as_deref().unwrap_or("-"),
            link.url
        );
    }
}
