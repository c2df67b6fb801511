mod commands;

use std::sync::Arc;

use bizu_core::{
    spawn_sweeper, ArticleStore, Backend, DeskConfig, FileStorage, LikeStore, RestBackend,
    Session, TtlCache,
};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::commands::{Cli, Context};

const LIST_NAMESPACE: &str = "bizu_list:";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let mut config = DeskConfig::load();
    config.apply_env();
    if let Some(url) = &cli.base_url {
        config.backend.base_url = url.clone();
    }

    let mut rest = RestBackend::new(&config.backend)?;
    if let Ok(token) = std::env::var("BIZU_ACCESS_TOKEN") {
        rest = rest.with_access_token(token);
    }
    let backend: Arc<dyn Backend> = Arc::new(rest);

    let session = Session::anonymous();
    match backend.current_profile().await {
        Ok(profile) => session.sign_in(profile.into()),
        Err(e) => warn!(error = %e, "continuing without a session"),
    }

    let storage = load_storage(&config).await;
    let cache = TtlCache::with_namespace(storage, LIST_NAMESPACE);
    let sweeper = spawn_sweeper(cache.clone(), config.cache.sweep_interval());

    let articles = ArticleStore::new(backend.clone(), session.clone(), cache.clone())
        .with_list_ttl(config.cache.list_ttl());
    let ctx = Context {
        likes: LikeStore::new(backend, session).with_articles(articles.clone()),
        articles,
        cache,
        default_limit: config.feed.default_limit,
    };
    let result = commands::run(cli.command, &ctx).await;

    sweeper.stop().await?;
    result
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn load_storage(config: &DeskConfig) -> Arc<FileStorage> {
    let quota = Some(config.cache.storage_quota_bytes);
    let path = match DeskConfig::config_dir() {
        Ok(dir) => dir.join("storage.json"),
        Err(e) => {
            warn!(error = %e, "no config dir, keeping cache in the working directory");
            std::path::PathBuf::from("bizu-storage.json")
        }
    };
    Arc::new(FileStorage::load_from(path, quota).await)
}
