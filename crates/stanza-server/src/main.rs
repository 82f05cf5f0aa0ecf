use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use stanza_db::{ImportMode, MemoryStore, backfill_lexemes, import_lexicon};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use stanza_server::{AppState, import_corpus, router};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = load_config();
    info!("binding to {}:{}", config.host, config.port);
    if config.disable_cache {
        info!("cache headers disabled");
    }

    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), store.clone(), config.disable_cache);

    let start = Instant::now();
    if let Some(dir) = &config.poems_dir {
        info!("importing poems from {}", dir.display());
        import_corpus(&state.sync, dir)?;
    }
    if let Some(path) = &config.lexicon_path {
        info!(
            "importing lexicon from {} (mode: {:?})",
            path.display(),
            config.lexicon_mode
        );
        import_lexicon(store.as_ref(), path, config.lexicon_mode)?;
    }
    if config.backfill_lexemes {
        let report = backfill_lexemes(store.as_ref(), store.as_ref())
            .context("lexeme backfill failed")?;
        info!(
            "backfill: {} created, {} already present",
            report.created, report.already_present
        );
    }
    info!(
        "seeded {} poems and {} lexemes in {} ms",
        store.poem_count(),
        store.lexeme_count(),
        start.elapsed().as_millis()
    );

    let app = router(state).layer(TraceLayer::new_for_http());
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Clone)]
struct Config {
    host: String,
    port: u16,
    disable_cache: bool,
    poems_dir: Option<PathBuf>,
    lexicon_path: Option<PathBuf>,
    lexicon_mode: ImportMode,
    backfill_lexemes: bool,
}

fn load_config() -> Config {
    let mut disable_cache = false;
    let mut backfill_lexemes = false;
    let mut cli_poems_dir: Option<PathBuf> = None;
    let mut cli_lexicon: Option<PathBuf> = None;
    let mut lexicon_mode = ImportMode::default();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--no-cache" => disable_cache = true,
            "--backfill-lexemes" => backfill_lexemes = true,
            "--poems-dir" => cli_poems_dir = args.next().map(PathBuf::from),
            "--lexicon" => cli_lexicon = args.next().map(PathBuf::from),
            _ => {
                if let Some(path) = arg.strip_prefix("--poems-dir=") {
                    cli_poems_dir = Some(PathBuf::from(path));
                } else if let Some(path) = arg.strip_prefix("--lexicon=") {
                    cli_lexicon = Some(PathBuf::from(path));
                } else if let Some(mode) = arg.strip_prefix("--lexicon-mode=") {
                    match mode.parse() {
                        Ok(parsed) => lexicon_mode = parsed,
                        Err(err) => warn!("{err}; keeping {lexicon_mode:?}"),
                    }
                } else {
                    warn!("ignoring unknown argument {arg}");
                }
            }
        }
    }

    let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let poems_dir = cli_poems_dir.or_else(|| env::var("POEMS_DIR").ok().map(PathBuf::from));
    let lexicon_path = cli_lexicon.or_else(|| env::var("LEXICON_PATH").ok().map(PathBuf::from));

    Config {
        host,
        port,
        disable_cache,
        poems_dir,
        lexicon_path,
        lexicon_mode,
        backfill_lexemes,
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();
}
