mod cli;

use reelhouse::{config, server, transcode};
use reelhouse_av::ToolRegistry;
use reelhouse_common::quality;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use tokio_util::sync::CancellationToken;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting Reelhouse server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelhouse=trace,reelhouse_av=debug,reelhouse_common=debug,tower_http=debug".to_string()
        } else {
            "reelhouse=info,reelhouse_av=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            // Create tokio runtime
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Transcode {
            input,
            qualities,
            output_dir,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(transcode_file(
                &input,
                qualities,
                output_dir.as_deref(),
                cli.config.as_deref(),
            ))
        }
        Commands::Qualities { file } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(list_qualities(&file, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("reelhouse {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn transcode_file(
    input: &Path,
    qualities: Vec<String>,
    output_dir: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !input.is_file() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let qualities = if qualities.is_empty() {
        config.transcode.qualities.clone()
    } else {
        qualities
    };
    for name in &qualities {
        quality::lookup(name)?;
    }

    let output_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };

    let tools = ToolRegistry::discover(&config.tools);
    tools.require("ffmpeg")?;
    let encoder = server::ffmpeg_encoder(&config, &tools);

    let cancel = CancellationToken::new();
    let orchestrator = transcode::TranscodeOrchestrator::start(
        encoder,
        transcode::OrchestratorOptions {
            workers: 1,
            queue_capacity: 1,
        },
        cancel.clone(),
    );

    // Ctrl+C kills the running encode.
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    println!("Transcoding {} into {}", input.display(), output_dir.display());
    let (job_id, status) = orchestrator
        .run_job(input, &output_dir, qualities.clone())
        .await;
    orchestrator.shutdown().await;

    let record = orchestrator
        .jobs()
        .get(job_id)
        .context("job record missing")?;
    for name in &record.produced {
        println!("  ✓ {name}");
    }
    for name in &record.skipped {
        println!("  - {name} (skipped)");
    }

    match status {
        transcode::JobStatus::Completed => {
            println!("Done");
            Ok(())
        }
        transcode::JobStatus::Failed { quality, error } => {
            anyhow::bail!(
                "Transcode failed at {}: {error}",
                quality.as_deref().unwrap_or("setup")
            )
        }
        transcode::JobStatus::Cancelled => anyhow::bail!("Transcode cancelled"),
        other => anyhow::bail!("Unexpected job state: {other:?}"),
    }
}

async fn list_qualities(file: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !file.is_file() {
        anyhow::bail!("File does not exist: {:?}", file);
    }
    let dir = file.parent().unwrap_or_else(|| Path::new("."));

    let found =
        transcode::available_qualities(dir, file, &config.transcode.qualities).await;

    println!("{}", file.display());
    println!("  original");
    for name in found {
        println!("  {name}");
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable transcoding.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_summary(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            print_summary(&config);
        }
    }

    Ok(())
}

fn print_summary(config: &config::Config) {
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Videos: {}", config.storage.videos_dir.display());
    println!(
        "  Rate limit: {}/s, burst {}",
        config.rate_limit.per_second, config.rate_limit.burst
    );
    println!(
        "  Transcode: {} ({} workers, qualities {})",
        if config.transcode.enabled { "enabled" } else { "disabled" },
        config.transcode.workers,
        config.transcode.qualities.join(", ")
    );
}
