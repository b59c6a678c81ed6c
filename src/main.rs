use clap::Parser;
use club_export::adapters::http::{self, AppState};
use club_export::config::{CliConfig, Command, TomlConfig};
use club_export::core::progress::{ObserverSlot, ProgressMessage, ProgressReporter};
use club_export::core::Storage;
use club_export::utils::error::{ErrorCategory, ExportError};
use club_export::utils::{logger, validation::Validate};
use club_export::{AttributeClient, ExportEngine, LocalStorage};
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn exit_with(e: &ExportError) -> ! {
    tracing::error!("❌ {} (code: {}, category: {:?})", e, e.code(), e.category());
    eprintln!("❌ {}", e.user_friendly_message());

    let exit_code = match e.category() {
        ErrorCategory::Input => 2,
        _ => 1,
    };
    std::process::exit(exit_code);
}

async fn run_once(
    engine: ExportEngine<AttributeClient>,
    input: PathBuf,
    output_dir: PathBuf,
    shutdown: CancellationToken,
) -> club_export::Result<PathBuf> {
    let file = std::fs::File::open(&input)?;
    tracing::info!("📂 Reading {}", input.display());

    let observers = Arc::new(ObserverSlot::new());
    let (tx, mut rx) = mpsc::channel(64);
    observers.attach(&tx);
    let progress_log = tokio::spawn(async move {
        while let Some(ProgressMessage::Progress { progress }) = rx.recv().await {
            tracing::info!("⏳ {:.1}%", progress);
        }
    });

    let result = engine
        .run(BufReader::new(file), &ProgressReporter::new(observers), &shutdown)
        .await;
    drop(tx);
    let _ = progress_log.await;

    let output = result?;
    let storage = LocalStorage::new(output_dir);
    storage.write_file(&output.file_name, &output.body).await?;
    Ok(storage.full_path(&output.file_name))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let config = match TomlConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    logger::init_logger(cli.verbose, config.logging.log_format());
    tracing::info!("Starting club-export");
    if cli.verbose {
        tracing::debug!("Config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    let client = AttributeClient::new(config.enrichment.clone());
    if let Err(e) = client.ready().await {
        exit_with(&e);
    }
    let engine = ExportEngine::new(client);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("🛑 Shutdown requested");
                shutdown.cancel();
            }
        });
    }

    match cli.command {
        Command::Serve { bind, port } => {
            let mut server = config.server.clone();
            if let Some(bind) = bind {
                server.bind = bind;
            }
            if let Some(port) = port {
                server.port = port;
            }
            let addr: SocketAddr = format!("{}:{}", server.bind, server.port).parse()?;

            let state = AppState::new(
                engine,
                LocalStorage::new(&config.output.directory),
                config.output.delivery,
                server.public_url(),
                shutdown,
            );
            if let Err(e) = http::serve(state, addr, server.max_upload_bytes()).await {
                exit_with(&e);
            }
        }
        Command::Run { input, output_dir } => {
            match run_once(engine, input, output_dir, shutdown).await {
                Ok(path) => {
                    tracing::info!("📁 Output saved to: {}", path.display());
                    println!("✅ Export completed successfully!");
                    println!("📁 Output saved to: {}", path.display());
                }
                Err(e) => exit_with(&e),
            }
        }
    }

    Ok(())
}
