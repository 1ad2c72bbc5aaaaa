//! `kevcal` -- turn a face photo into a 12-month calendar.
//!
//! Uploads up to three reference images to the KevCal service, runs a
//! calendar generation job and, optionally, sends the result to Printful
//! and downloads the generated months.
//!
//! # Environment variables
//!
//! See [`ClientConfig::from_env`]. `RUST_LOG` overrides the default
//! `kevcal=info` log filter.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use kevcal_cli::config::ClientConfig;
use kevcal_client::{CalendarSession, KevCalApi, NoticeLevel, ProductOutcome, SessionEvent};
use kevcal_core::upload::CandidateFile;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Reference images (at most three are used).
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Also create the Printful product and wait for its mockup.
    #[arg(long, default_value_t = false)]
    product: bool,

    /// Download the generated months into this directory.
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kevcal=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = ClientConfig::from_env()?;

    tracing::info!(
        base_url = %config.base_url,
        images = args.images.len(),
        product = args.product,
        "Starting kevcal",
    );

    let api = KevCalApi::with_timeout(&config.base_url, config.request_timeout)?;
    let mut session = CalendarSession::new(api, config.session_config());

    let printer = tokio::spawn(print_events(session.subscribe()));

    let cancel = session.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            cancel.cancel();
        }
    });

    let result = run(&mut session, &args).await;

    // Closing the channel lets the printer drain and exit.
    drop(session);
    let _ = printer.await;

    result
}

async fn run(session: &mut CalendarSession, args: &Args) -> anyhow::Result<()> {
    let status = session.verify_connection().await;
    if args.product && !status.connected {
        anyhow::bail!("Printful is not connected; cannot create a product");
    }

    let candidates = args
        .images
        .iter()
        .map(|path| {
            CandidateFile::from_path(path)
                .with_context(|| format!("cannot read {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    session.add_files(candidates).await?;
    if session.uploads().is_empty() {
        anyhow::bail!("no image could be uploaded");
    }

    session.generate().await?;

    if let Some(dir) = &args.out {
        for path in session.download_all(dir).await? {
            println!("{}", path.display());
        }
    }

    if args.product {
        match session.create_product().await? {
            ProductOutcome::Started => {}
            ProductOutcome::MockupsReady(urls) => {
                for url in urls {
                    println!("{url}");
                }
            }
        }
    }

    Ok(())
}

/// Render session events on the log until the session is dropped.
async fn print_events(mut rx: broadcast::Receiver<SessionEvent>) {
    loop {
        match rx.recv().await {
            Ok(SessionEvent::Notice { level, message }) => match level {
                NoticeLevel::Error => tracing::error!("{message}"),
                NoticeLevel::Warning => tracing::warn!("{message}"),
                NoticeLevel::Info | NoticeLevel::Success => tracing::info!("{message}"),
            },
            Ok(SessionEvent::ConnectionChecked { summary, .. }) => tracing::info!("{summary}"),
            Ok(SessionEvent::Progress { label, .. }) => tracing::info!("{label}"),
            Ok(SessionEvent::MockupChecked { attempt, .. }) => {
                tracing::info!(attempt, "Waiting for Printful mockup")
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Event printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
