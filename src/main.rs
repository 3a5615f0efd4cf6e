use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedstore::app::AppContext;
use feedstore::cli::{commands, Cli, Commands};
use feedstore::config::Config;
use feedstore::daemon::{Daemon, DaemonConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(workers) = cli.workers {
        config.daemon.workers = workers;
    }
    let ctx = AppContext::new(config, cli.data_dir)?;

    match cli.command {
        Commands::Init => {
            commands::init(&ctx)?;
        }
        Commands::List { items, json } => {
            if items {
                commands::list_items(&ctx)?;
            } else {
                commands::list_feeds(&ctx, json)?;
            }
        }
        Commands::Subscribe {
            url,
            title,
            view_type,
            folder,
            no_fetch,
        } => {
            commands::subscribe(&ctx, &url, title, view_type, folder, !no_fetch).await?;
        }
        Commands::Unsubscribe { feed } => {
            commands::unsubscribe(&ctx, &feed)?;
        }
        Commands::Refresh => {
            commands::refresh(&ctx).await?;
        }
        Commands::Prune { days } => {
            let days = days.unwrap_or(ctx.config.storage.prune_days);
            commands::prune(&ctx, days)?;
        }
        Commands::ResolveId { feed_url, path } => {
            commands::resolve_ids(&feed_url, &path)?;
        }
        Commands::Daemon {
            interval,
            refresh,
            no_initial_run,
        } => {
            let interval = interval.unwrap_or_else(|| ctx.config.daemon.interval.clone());
            let config = DaemonConfig {
                interval_secs: DaemonConfig::parse_interval(&interval)
                    .map_err(|e| anyhow::anyhow!(e))?,
                run_on_start: !no_initial_run,
                refresh: refresh || ctx.config.daemon.refresh,
                prune_days: ctx.config.storage.prune_days,
            };
            Daemon::new(Arc::new(ctx), config).run().await?;
        }
    }

    Ok(())
}
