//! Tika Extract command line
//!
//! Extracts text, HTML, metadata or the content type of a document, or runs
//! a persistent engine server.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tika_extract::config::{Cli, Command};
use tika_extract::transport::PersistentTransport;
use tika_extract::{Document, ExtractionKind, Extractor, TikaConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    // Initialize tracing (M-LOG-STRUCTURED); stdout carries extraction output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = TikaConfig::from_cli(&cli).context("loading configuration")?;

    let (kind, input) = match cli.command.clone() {
        Some(Command::Text { input }) => (ExtractionKind::Text, input),
        Some(Command::Html { input }) => (ExtractionKind::Html, input),
        Some(Command::Metadata { input }) => (ExtractionKind::Metadata, input),
        Some(Command::Mimetype { input }) => (ExtractionKind::Mimetype, input),
        Some(Command::Serve { kind, port }) => return serve(config, kind, port).await,
        None => {
            Cli::command().print_help()?;
            return Ok(());
        }
    };

    let extractor = match cli.server_port {
        Some(port) => {
            let transport = PersistentTransport::new(port, kind, config.engine.timeout());
            Extractor::with_transport(config, Arc::new(transport))
        }
        None => Extractor::new(config),
    };

    let doc = if input == "-" {
        extractor.document_from_reader(tokio::io::stdin())
    } else {
        extractor.document(&input)?
    };

    print_extracted(&doc, kind).await
}

async fn print_extracted(doc: &Document, kind: ExtractionKind) -> anyhow::Result<()> {
    match kind {
        ExtractionKind::Text => print!("{}", doc.text().await?),
        ExtractionKind::Html => print!("{}", doc.html().await?),
        ExtractionKind::Metadata => {
            println!("{}", serde_json::to_string_pretty(doc.metadata().await?)?);
        }
        ExtractionKind::Mimetype => match doc.mimetype().await? {
            Some(mime) => println!("{}\t{}", mime.content_type, mime.extensions.join(",")),
            None => {
                let reported = doc.metadata().await?.content_type().unwrap_or("unknown");
                anyhow::bail!("unregistered content type: {reported}");
            }
        },
    }
    Ok(())
}

async fn serve(config: TikaConfig, kind: ExtractionKind, port: Option<u16>) -> anyhow::Result<()> {
    let extractor = Extractor::new(config);
    let handle = extractor
        .server(kind, port)
        .await
        .context("starting engine server")?;

    info!(
        name: "server.listening",
        port = handle.port(),
        kind = %kind,
        "Engine server running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    handle.stop().await?;
    Ok(())
}
