use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tarot_bot::api::{AppState, routes};
use tarot_bot::channels::{
    LogPublisher, NeynarClient, Publisher, Publishers, TwitterClient, spawn_feed_poller,
};
use tarot_bot::config::AppConfig;
use tarot_bot::llm::create_provider;
use tarot_bot::pipeline::{
    EventDeduplicator, EventProcessor, IpRateLimiter, Platform, RateGate, ReadingPipeline,
    ReadingSource, open_store,
};
use tarot_bot::tarot::image::{FilebaseImageStore, VeniceImageGenerator};
use tarot_bot::tarot::{
    CardSelector, ComposerConfig, ContentFilter, FallbackPool, ImageGenerator, ImageStore,
    ImageSynthesizer, InformationResponder, OsRandom, RandomSource, ReadingComposer,
};

/// Tokens allowed for information-query answers.
const INFO_MAX_TOKENS: u32 = 150;

/// Console logging, plus a daily rolling file when `TAROT_LOG_DIR` is set.
///
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false));

    match std::env::var("TAROT_LOG_DIR").ok().filter(|d| !d.is_empty()) {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "tarot-bot.log"));
            registry
                .with(fmt::layer().with_target(false).with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    eprintln!("🔮 Tarot Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   API: http://0.0.0.0:{}/reading", config.server.port);
    eprintln!("   Webhook: http://0.0.0.0:{}/webhook", config.server.port);

    // ── Reading pipeline ─────────────────────────────────────────────────
    let llm = create_provider(&config.llm)?;
    let random: Arc<dyn RandomSource> = Arc::new(OsRandom);

    let generator: Option<Arc<dyn ImageGenerator>> = match &config.image.api_key {
        Some(key) => Some(Arc::new(VeniceImageGenerator::new(key.clone(), &config.image)?)),
        None => {
            warn!("VENICE_API_KEY not set, readings will use fallback images");
            None
        }
    };
    let image_store: Option<Arc<dyn ImageStore>> = match &config.storage.api_key {
        Some(key) => Some(Arc::new(FilebaseImageStore::new(key.clone(), &config.storage)?)),
        None => {
            warn!("FILEBASE_API_KEY not set, generated images cannot be stored");
            None
        }
    };
    let images = Arc::new(ImageSynthesizer::new(
        generator,
        image_store,
        FallbackPool::from_base(&config.image.fallback_base_url, config.image.fallback_count),
        random.clone(),
        config.image.timeout,
    ));

    let composer = ReadingComposer::new(
        llm.clone(),
        ComposerConfig {
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            timeout: config.llm.timeout,
            ..ComposerConfig::default()
        },
    );
    let readings: Arc<dyn ReadingSource> = Arc::new(ReadingPipeline::new(
        CardSelector::new(random),
        composer,
        InformationResponder::new(llm, config.llm.temperature, INFO_MAX_TOKENS)
            .with_timeout(config.llm.timeout),
        images,
    ));

    // ── Dedup + throttles ────────────────────────────────────────────────
    let dedup = match open_store(&config.dedup.backend).await {
        Ok(Some(store)) => {
            EventDeduplicator::with_store(config.dedup.ceiling, config.dedup.eviction, store)
                .await
        }
        Ok(None) => EventDeduplicator::new(config.dedup.ceiling, config.dedup.eviction),
        Err(e) => {
            warn!(error = %e, "Dedup store unavailable, keeping processed ids in memory only");
            EventDeduplicator::new(config.dedup.ceiling, config.dedup.eviction)
        }
    };
    let gate = Arc::new(RateGate::new(config.rate.debounce));
    let limiter = Arc::new(IpRateLimiter::new(
        config.rate.ip_max_requests,
        config.rate.ip_window,
        config.rate.admin_token.clone(),
    ));

    // ── Platforms ────────────────────────────────────────────────────────
    let neynar = match (&config.bot.neynar_api_key, &config.bot.signer_uuid) {
        (Some(key), Some(signer)) => Some(Arc::new(NeynarClient::new(
            key.clone(),
            signer.clone(),
            &config.bot,
        )?)),
        _ => None,
    };
    let farcaster: Arc<dyn Publisher> = match &neynar {
        Some(client) if config.bot.can_publish() => client.clone() as Arc<dyn Publisher>,
        _ => {
            info!("Farcaster publishing disabled, replies will be logged");
            Arc::new(LogPublisher)
        }
    };
    let mut publishers = Publishers::new().with(Platform::Farcaster, farcaster);

    match &config.twitter.user_token {
        Some(_) if config.bot.dry_run => {
            info!("Twitter dry run, replies will be logged");
            publishers = publishers.with(Platform::Twitter, Arc::new(LogPublisher));
        }
        Some(token) => {
            let client = TwitterClient::new(token.clone(), &config.twitter)?;
            publishers = publishers.with(Platform::Twitter, Arc::new(client));
            eprintln!("   Twitter: replying via {}", config.twitter.api_base_url);
        }
        None => eprintln!("   Twitter: disabled (no TWITTER_USER_TOKEN)"),
    }

    let processor = Arc::new(EventProcessor::new(
        readings.clone(),
        Arc::new(dedup),
        gate,
        publishers,
        config.bot.invocation_prefix.clone(),
    ));

    let poller = match &neynar {
        Some(client) => match client.signer_approved().await {
            Ok(true) => {
                eprintln!("   Poller: every {}s", config.bot.poll_interval.as_secs());
                Some(spawn_feed_poller(
                    client.clone(),
                    processor.clone(),
                    config.bot.poll_interval,
                    config.bot.poll_limit,
                ))
            }
            Ok(false) => {
                warn!("Signer not approved, feed polling disabled");
                None
            }
            Err(e) => {
                warn!(error = %e, "Signer lookup failed, feed polling disabled");
                None
            }
        },
        None => {
            eprintln!("   Poller: disabled (no Neynar credentials)");
            None
        }
    };

    // ── HTTP ─────────────────────────────────────────────────────────────
    let app = routes(AppState {
        readings,
        processor,
        limiter,
        filter: Arc::new(ContentFilter::default()),
    });

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .context("HTTP server failed")?;

    if let Some((handle, shutdown)) = poller {
        shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
        handle.abort();
    }
    info!("Shut down");
    Ok(())
}
