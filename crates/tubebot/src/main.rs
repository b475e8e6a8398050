use anyhow::Result;
use dotenvy::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use tubebot::cli::{Cli, Commands};
use tubebot::telegram::{
    create_bot, schema, setup_bot_commands, Bot, HandlerDeps, TelegramEditor, TelegramUploader,
};
use tubebot::worker::Worker;
use tubecore::core::{config, init_logger, log_cookies_configuration, web_server, RateLimiter, Settings};
use tubecore::download::batch::BatchExpander;
use tubecore::download::cookies::CookieStore;
use tubecore::download::downloader::Downloader;
use tubecore::download::pipeline::{JobRunner, RunnerOptions};
use tubecore::download::progress::DownloadEvent;
use tubecore::download::queue::{JobQueue, QueueLimits};
use tubecore::download::reporter::create_progress_bar;
use tubecore::download::resolution::Resolution;
use tubecore::download::source::{DownloadRequest, DownloadSource, YtDlpSource};

/// Interval of the rate limiter cleanup task
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Main entry point
///
/// Parses CLI arguments and dispatches to the subcommand; no subcommand runs the bot.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics instead of losing them with the dispatcher task
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Load environment variables from .env if present
    let _ = dotenv();

    init_logger(config::LOG_FILE_PATH.as_deref())?;
    let settings = Settings::load()?;

    match cli.command {
        Some(Commands::Run) | None => run_bot(settings).await,
        Some(Commands::Download { url, quality, output }) => run_cli_download(settings, url, quality, output).await,
        Some(Commands::CheckBatch { file }) => run_check_batch(file).await,
    }
}

async fn run_bot(settings: Settings) -> Result<()> {
    log::info!("🚀 Starting tubebot v{}", env!("CARGO_PKG_VERSION"));
    log_cookies_configuration(&settings);

    fs_err::tokio::create_dir_all(&settings.temp_files_dir).await?;
    fs_err::tokio::create_dir_all(&settings.cookies_dir).await?;

    let bot = create_bot()?;
    let me = bot.get_me().await?;
    log::info!("Bot username: {:?}, Bot ID: {}", me.username, me.id);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let settings = Arc::new(settings);
    let queue = Arc::new(JobQueue::new(QueueLimits::from(settings.as_ref())));
    let cookies = CookieStore::new(&settings.cookies_dir, settings.ytdl_cookies_file.clone());
    let rate_limiter = RateLimiter::from_settings(&settings);

    let source: Arc<dyn DownloadSource> = Arc::new(YtDlpSource::new(&settings.ytdl_bin, settings.download_timeout()));
    let downloader = Downloader::new(Arc::clone(&source), settings.resolution_policy, settings.max_duration_secs);
    let editor = Arc::new(TelegramEditor::new(bot.clone()));
    let uploader = Arc::new(TelegramUploader::new(bot.clone()));
    let runner = Arc::new(JobRunner::new(
        downloader,
        uploader,
        editor.clone(),
        cookies.clone(),
        RunnerOptions::from(settings.as_ref()),
    ));

    let shutdown = CancellationToken::new();
    let worker = Worker::new(Arc::clone(&queue), runner, editor);
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    {
        let rate_limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut tick = interval(RATE_LIMIT_CLEANUP_INTERVAL);
            loop {
                tick.tick().await;
                rate_limiter.cleanup().await;
            }
        });
    }

    {
        let queue = Arc::clone(&queue);
        let port = settings.port;
        tokio::spawn(async move {
            if let Err(e) = web_server::start_web_server(port, queue).await {
                log::error!("Web server error: {}", e);
            }
        });
    }

    let deps = HandlerDeps::new(
        Arc::clone(&queue),
        source,
        rate_limiter,
        cookies,
        Arc::clone(&settings),
        me.username.clone(),
        me.id,
    );
    dispatch(bot, deps).await;

    log::info!("Dispatcher stopped, shutting down worker");
    shutdown.cancel();
    let _ = worker_handle.await;
    let stats = queue.stats();
    if stats.running > 0 || stats.queued > 0 {
        log::warn!(
            "Exiting with {} running and {} queued job(s)",
            stats.running,
            stats.queued
        );
    }
    Ok(())
}

async fn dispatch(bot: Bot, deps: HandlerDeps) {
    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();

    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;
}

/// One-off download through the same adapter, without Telegram
async fn run_cli_download(
    settings: Settings,
    url: String,
    quality: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let url = tubecore::download::batch::normalize_url(&url).ok_or_else(|| anyhow::anyhow!("Invalid URL: {}", url))?;
    let resolution = match quality {
        Some(q) => q.parse::<Resolution>().map_err(|e| anyhow::anyhow!("Invalid quality {}: {}", q, e))?,
        None => settings.default_resolution,
    };
    let source = Arc::new(YtDlpSource::new(&settings.ytdl_bin, settings.download_timeout()));
    if !source.supports_url(&url) {
        return Err(anyhow::anyhow!("Not a YouTube link: {}", url));
    }
    let output_dir = output.unwrap_or_else(|| PathBuf::from("."));
    fs_err::tokio::create_dir_all(&output_dir).await?;

    println!("🎬 tubebot CLI download");
    println!("URL: {}", url);
    println!("Requested quality: {}", resolution);

    let downloader = Downloader::new(source, settings.resolution_policy, settings.max_duration_secs);

    // Download into a scratch dir so other files in the output dir are never picked up
    let scratch = tempfile::Builder::new().prefix("job-").tempdir_in(&output_dir)?;
    let request = DownloadRequest::builder()
        .url(url)
        .resolution(resolution)
        .output_dir(scratch.path())
        .maybe_cookies_file(settings.ytdl_cookies_file.clone())
        .build();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                DownloadEvent::Metadata { title, .. } => println!("Title: {}", title),
                DownloadEvent::ResolutionFallback { requested, chosen } => {
                    println!("⚠️ {} is not available, downloading {} instead", requested, chosen)
                }
                DownloadEvent::Progress(progress) => {
                    println!("📥 {} {}%", create_progress_bar(progress.percent), progress.percent)
                }
            }
        }
    });

    let result = downloader.fetch(&request, events_tx, cancel).await;
    let _ = printer.await;
    let output = result?;

    let file_name = output
        .file_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Downloaded file has no name"))?;
    let destination = output_dir.join(file_name);
    fs_err::tokio::rename(&output.file_path, &destination).await?;

    println!("✅ Saved {} ({}, {} bytes)", destination.display(), output.resolution, output.file_size);
    Ok(())
}

/// Prints what a batch file would queue
async fn run_check_batch(file: PathBuf) -> Result<()> {
    let expander = BatchExpander::from_file(&file).await?;
    let summary = expander.summary();

    for line in expander.iter() {
        println!("✅ line {}: {}", line.line_no, line.url);
    }
    for (line_no, text) in expander.invalid_lines() {
        println!("❌ line {}: {}", line_no, text);
    }
    println!(
        "\n📁 {}: {} valid, {} invalid, {} blank, {} comment line(s)",
        file.display(),
        summary.valid,
        summary.invalid,
        summary.blank,
        summary.comments
    );

    if summary.valid == 0 {
        return Err(anyhow::anyhow!("No valid links in {}", file.display()));
    }
    Ok(())
}
