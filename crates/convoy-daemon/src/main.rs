use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use convoy_core::config::ConvoyConfig;
use convoy_scheduler::ScheduleFilter;

mod app;
mod cli;

use app::App;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "convoy_daemon=info,convoy_scheduler=info,convoy_leader=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // config: --config > CONVOY_CONFIG > ~/.convoy/convoy.toml
    let config = ConvoyConfig::load(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("{} ({})", e, e.code()))?;
    let app = App::build(config)?;

    match cli.command {
        Commands::Run => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for ctrl-c");
                }
                info!("shutdown signal received");
                on_signal.cancel();
            });
            info!("convoy daemon starting");
            app.run(cancel).await?;
            info!("convoy daemon stopped");
        }
        Commands::Migrate => {
            let report = app.store.migrate_from_legacy().await?;
            println!(
                "migrated {} schedule(s), {} already present, {} invalid",
                report.migrated, report.skipped, report.invalid
            );
        }
        Commands::List {
            user,
            status,
            team,
            json,
        } => {
            let filter = ScheduleFilter {
                user_id: user,
                status,
                team_id: team,
                ..Default::default()
            };
            let schedules = app.service.list(&filter).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&schedules)?);
            } else {
                for s in &schedules {
                    let next = s
                        .next_execution_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string());
                    let timing = if s.cron_expr.is_empty() { "once" } else { s.cron_expr.as_str() };
                    println!("{}\t{}\t{}\t{}\t{}", s.id, s.status, timing, next, s.name);
                }
            }
        }
        Commands::Trigger { id } => {
            let record = app.service.trigger(&id).await?;
            println!(
                "triggered {id}: session {}",
                record.session_id.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}
