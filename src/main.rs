use std::sync::Arc;

use aws_sdk_s3::config::Credentials;
use meg::cache::{Caches, InMemoryCacheProvider};
use meg::config::{CacheBackend, Config};
use meg::format::FormatRegistry;
use meg::http::{router, AppState};
use meg::invalidator::Invalidator;
use meg::mime::ExtensionMimeResolver;
use meg::planner::Planner;
use meg::store::aws::AwsObjectStore;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("meg: configuration error: {e}");
            std::process::exit(1);
        }
    };

    let cache_provider = match &config.cache {
        CacheBackend::InMemory => Arc::new(InMemoryCacheProvider::new()),
        CacheBackend::Redis(url) => {
            eprintln!("meg: --cache redis:{url} is not available in this build; use in-memory");
            std::process::exit(1);
        }
    };

    let mut sdk_config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = &config.region {
        sdk_config_loader = sdk_config_loader.region(aws_sdk_s3::config::Region::new(region.clone()));
    }
    if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
        sdk_config_loader = sdk_config_loader.credentials_provider(Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "meg-config",
        ));
    }
    let sdk_config = sdk_config_loader.load().await;

    let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);
    if let Some(endpoint) = &config.endpoint_url {
        s3_config_builder = s3_config_builder.endpoint_url(endpoint.clone());
        // Path-style addressing is required by most non-AWS S3-compatible
        // endpoints, which don't support virtual-hosted-style buckets.
        s3_config_builder = s3_config_builder.force_path_style(true);
    }
    let s3_client = aws_sdk_s3::Client::from_conf(s3_config_builder.build());

    let store = Arc::new(AwsObjectStore::new(s3_client, config.bucket.clone()));
    let caches = Arc::new(Caches::new(cache_provider));
    let formats = Arc::new(FormatRegistry::with_defaults());
    let mime = Arc::new(ExtensionMimeResolver::new());

    let planner = Planner::new(Arc::clone(&store), Arc::clone(&caches), formats, mime);

    let invalidator = Arc::new(Invalidator::new(store, caches));
    tokio::spawn({
        let invalidator = Arc::clone(&invalidator);
        async move { invalidator.run_periodic_poll().await }
    });

    let state = Arc::new(AppState { planner, force_download: config.force_download });
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!(bucket = %config.bucket, %addr, "meg listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
