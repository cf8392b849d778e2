use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use hnfeed::config;
use hnfeed::db;
use hnfeed::feed::{HnClient, ItemSource};
use hnfeed::model::{Item, ItemId};
use hnfeed::session::{RefreshOutcome, Session};
use hnfeed::settings::parse_locale_arg;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch the newest items and print them in feed order
    Feed,
    /// Manage saved items
    #[command(subcommand)]
    Favorites(FavoritesCmd),
    /// Show or change persisted settings
    #[command(subcommand)]
    Settings(SettingsCmd),
    /// Print an example config file
    InitConfig,
}

#[derive(Debug, Subcommand)]
enum FavoritesCmd {
    List,
    /// Fetch an item by id and save it
    Add { id: i64 },
    Remove { id: i64 },
    Clear,
}

#[derive(Debug, Subcommand)]
enum SettingsCmd {
    Show,
    SetLimit { limit: usize },
    /// en_US or it_IT
    SetLocale { locale: String },
    SetReader {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    if let Command::InitConfig = args.command {
        print!("{}", config::example());
        return Ok(());
    }

    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.database_url());
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let client = Arc::new(HnClient::from_config(&cfg)?);
    let session = Session::open(client.clone(), pool, cfg.feed.concurrency).await?;

    match args.command {
        Command::Feed => {
            info!(limit = session.settings().await.load_limit, "loading feed");
            match session.refresh().await {
                RefreshOutcome::Published { failed, .. } => {
                    for (n, item) in session.items().await.iter().enumerate() {
                        print_item(n + 1, item, session.is_favorite(item.id).await);
                    }
                    if failed > 0 {
                        eprintln!("{failed} item(s) could not be loaded");
                    }
                }
                RefreshOutcome::ListingFailed | RefreshOutcome::Stale => {
                    let msg = session
                        .error()
                        .await
                        .unwrap_or_else(|| "feed refresh was superseded".to_string());
                    anyhow::bail!(msg);
                }
            }
        }
        Command::Favorites(cmd) => match cmd {
            FavoritesCmd::List => {
                for (n, fav) in session.favorites().await.iter().enumerate() {
                    print_item(n + 1, &fav.to_item(), true);
                    println!("      saved {}", fav.saved_at.format("%Y-%m-%d %H:%M UTC"));
                }
            }
            FavoritesCmd::Add { id } => {
                let item = client.fetch_item(ItemId(id)).await?;
                if session.save_favorite(&item).await {
                    println!("saved {id}");
                } else {
                    println!("{id} not saved (already saved or storage unavailable)");
                }
            }
            FavoritesCmd::Remove { id } => {
                if session.remove_favorite(id).await {
                    println!("removed {id}");
                } else {
                    println!("{id} was not saved");
                }
            }
            FavoritesCmd::Clear => {
                session.clear_favorites().await;
                println!("favorites cleared");
            }
        },
        Command::Settings(cmd) => {
            match cmd {
                SettingsCmd::Show => {}
                SettingsCmd::SetLimit { limit } => session.set_load_limit(limit).await?,
                SettingsCmd::SetLocale { locale } => {
                    session.set_date_locale(parse_locale_arg(&locale)?).await?
                }
                SettingsCmd::SetReader { enabled } => session.set_enters_reader(enabled).await?,
            }
            let s = session.settings().await;
            println!("load_limit:    {}", s.load_limit);
            println!("date_locale:   {}", s.date_locale.as_str());
            println!("enters_reader: {}", s.enters_reader);
            println!("concurrency:   {}", session.concurrency());
        }
        // printed before the config is loaded
        Command::InitConfig => {}
    }

    Ok(())
}

fn print_item(n: usize, item: &Item, saved: bool) {
    let marker = if saved { "*" } else { " " };
    println!("{n:>3}.{marker} {} [{}]", item.title, item.kind);
    let when = item
        .created_at_utc()
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".into());
    println!(
        "      by {} | {} points | {} comments | {}",
        item.author,
        item.score.unwrap_or(0),
        item.descendant_count,
        when
    );
    if let Some(url) = &item.url {
        println!("      {url}");
    }
}
