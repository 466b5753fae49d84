use anyhow::{Context, Error};
use envconfig::Envconfig;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use trip_import::{
    config::Config,
    context::AppContext,
    emit::{duplicates::CsvDuplicateSink, postgres::PgCopyLoader},
    metrics_utils::setup_metrics_recorder,
    pipeline::TripImportPipeline,
    source::delimited::DelimitedFileSource,
};

fn setup_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_layer = if json {
        fmt::layer().json().with_filter(filter).boxed()
    } else {
        fmt::layer().with_target(true).with_filter(filter).boxed()
    };
    tracing_subscriber::registry().with(log_layer).init();
}

// Cancels the import on the first ctrl-c. A second one falls through to the
// default handler.
fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, cancelling import");
                cancel.cancel();
            }
            Err(e) => error!("Failed to listen for interrupt: {:?}", e),
        }
    });
}

async fn run(config: Config) -> Result<(), Error> {
    let pipeline_config = config
        .pipeline_config()
        .context("invalid pipeline configuration")?;

    // A missing or headerless input fails before any database work
    let mut source =
        DelimitedFileSource::open(&pipeline_config.input_path, pipeline_config.delimiter).await?;

    let context = AppContext::new(&config).await?;
    if config.run_migrations {
        context.run_migrations().await?;
    }

    let loader = PgCopyLoader::new(
        context.db.clone(),
        config.load_max_attempts,
        config.load_backoff(),
    );
    let duplicates = CsvDuplicateSink::new(
        pipeline_config.duplicates_path.clone(),
        pipeline_config.delimiter,
    );

    let pipeline =
        TripImportPipeline::new(&pipeline_config, Box::new(loader), Box::new(duplicates))?;

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let stats = pipeline.run(&mut source, &cancel).await?;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::init_from_env().context("failed to read configuration")?;
    setup_tracing(config.log_json);
    let metrics = setup_metrics_recorder().context("failed to install metrics recorder")?;
    info!("Starting trip import from {}", config.input_path);

    let result = run(config).await;
    info!("Run metrics:\n{}", metrics.render());

    if let Err(e) = result {
        error!("Trip import failed: {:#}", e);
        return Err(e);
    }

    info!("Shutting down");
    Ok(())
}
