mod cli;

use skygrab::{
    assemble::OutputFormat,
    bsky::{BskyClient, PostRef},
    config,
    pipeline::DownloadRequest,
    server,
};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "skygrab=trace,skygrab_hls=trace,tower_http=debug".to_string()
        } else {
            "skygrab=debug,skygrab_hls=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Fetch {
            url,
            resolution,
            format,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(fetch_post(&url, &resolution, format, cli.config.as_deref()))
        }
        Commands::Probe { url, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_post(&url, json))
        }
        Commands::CheckTools => check_tools(),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("skygrab {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn start_server(host: String, port: u16, config_path: Option<&std::path::Path>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    config.server.host = host;
    config.server.port = port;

    tracing::info!("Starting skygrab server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    server::start_server(config).await
}

async fn fetch_post(
    url: &str,
    resolution: &str,
    format: OutputFormat,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let post = PostRef::parse(url)?;

    println!(
        "Downloading {}/{} at {} as {}",
        post.profile, post.post_id, resolution, format
    );

    let ctx = server::AppContext::new(config, BskyClient::new());
    let request = DownloadRequest {
        profile: post.profile,
        post_id: post.post_id,
        resolution: resolution.to_string(),
        format,
    };
    let outcome = ctx.pipeline.run_download(&request).await?;

    println!("Saved: {}", outcome.path.display());
    Ok(())
}

async fn probe_post(url: &str, json: bool) -> Result<()> {
    let post = PostRef::parse(url)?;
    let client = BskyClient::new();
    let metadata = client
        .fetch_post_metadata(&post.profile, &post.post_id)
        .await?;

    let config = config::Config::default();
    let ctx = server::AppContext::new(config, client);
    let resolutions = ctx
        .pipeline
        .available_resolutions(&metadata.playlist_url)
        .await?;

    if json {
        let value = serde_json::json!({
            "profile": post.profile,
            "post_id": post.post_id,
            "thumbnail": metadata.thumbnail_url,
            "like_count": metadata.like_count,
            "reply_count": metadata.reply_count,
            "repost_count": metadata.repost_count,
            "resolutions": resolutions,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("Post: {}/{}", post.profile, post.post_id);
        println!(
            "Likes: {}  Replies: {}  Reposts: {}",
            metadata.like_count, metadata.reply_count, metadata.repost_count
        );
        if let Some(ref thumbnail) = metadata.thumbnail_url {
            println!("Thumbnail: {}", thumbnail);
        }
        println!("Resolutions:");
        for resolution in resolutions {
            println!("  {}", resolution);
        }
    }

    Ok(())
}

fn check_tools() -> Result<()> {
    println!("Checking external tools...\n");

    match which::which("ffmpeg") {
        Ok(path) => {
            println!("✓ ffmpeg - {}", path.display());
            Ok(())
        }
        Err(_) => {
            println!("✗ ffmpeg not found on PATH");
            anyhow::bail!("ffmpeg is required for segment assembly")
        }
    }
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Storage root: {:?}", config.storage.root);
            println!(
                "  Workspace TTL: {}s (reap every {}s)",
                config.storage.ttl_secs, config.storage.reap_interval_secs
            );
            println!("  Fetch concurrency: {}", config.fetch.concurrency);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
