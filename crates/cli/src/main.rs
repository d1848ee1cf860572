use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use finsight_core::Analyzer;

#[derive(Debug, Parser)]
#[command(name = "finsight_cli", about = "Analyze one ticker and print a recommendation")]
struct Args {
    /// Ticker symbol, e.g. AAPL, BRK.B, ^GSPC.
    ticker: String,

    /// Print the full analysis result as JSON instead of the markdown report.
    #[arg(long)]
    json: bool,

    /// Skip the AI collaborator and use the offline rules only.
    #[arg(long)]
    offline: bool,

    /// Store the result in DATABASE_URL.
    #[arg(long)]
    persist: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let settings = finsight_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let analyzer = Analyzer::from_settings(&settings, args.offline)?;
    let result = analyzer.analyze(&args.ticker).await;

    if args.persist {
        let db_url = settings.require_database_url()?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(db_url)
            .await
            .context("connect DATABASE_URL failed")?;
        finsight_core::storage::migrate(&pool).await?;

        match finsight_core::storage::analyses::persist_analysis(&pool, &result).await {
            Ok(id) => tracing::info!(%id, ticker = %result.ticker, "analysis persisted"),
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(ticker = %result.ticker, error = %e, "persist analysis failed");
            }
        }
    }

    if args.json {
        let out = serde_json::to_string_pretty(&result).context("serialize analysis result failed")?;
        println!("{out}");
    } else {
        println!("{}", result.final_report);
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_sentry(settings: &finsight_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from(["finsight_cli", "msft", "--json", "--offline"]).unwrap();
        assert_eq!(args.ticker, "msft");
        assert!(args.json);
        assert!(args.offline);
        assert!(!args.persist);
    }

    #[test]
    fn ticker_is_required() {
        assert!(Args::try_parse_from(["finsight_cli"]).is_err());
    }
}
