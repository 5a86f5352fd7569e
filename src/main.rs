mod cli;
mod config;
mod detector;
mod error;
mod model;
mod render;
mod server;

use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use detector::{ComputeDevice, DetectionSession};
use error::Result;

fn parse_device(device_str: &str) -> Result<ComputeDevice> {
    match device_str {
        "cpu" => Ok(ComputeDevice::Cpu),
        s if s.starts_with("cuda") => {
            let parts: Vec<&str> = s.split(':').collect();
            let ordinal = if parts.len() > 1 {
                parts[1].parse::<usize>().map_err(|_| {
                    error::Error::InvalidInput(format!("Invalid CUDA device: {}", s))
                })?
            } else {
                0
            };
            Ok(ComputeDevice::Cuda(ordinal))
        }
        _ => Err(error::Error::InvalidInput(format!(
            "Unknown device: {}",
            device_str
        ))),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Detect {
            image,
            prompt,
            model,
            threshold,
            device,
            output,
            show_index,
            font,
        } => {
            let device = parse_device(&device)?;
            let input = image::open(&image)?;

            let mut session = DetectionSession::new(&config, device);
            match session.predict(&input, &model, &prompt, threshold)? {
                Some(boxes) => {
                    let result = serde_json::json!({
                        "model": model,
                        "ok": true,
                        "boxes": boxes,
                    });
                    println!("{}", serde_json::to_string_pretty(&result)?);

                    if let Some(path) = output {
                        let mut style = render::DrawStyle {
                            show_index,
                            ..render::DrawStyle::default()
                        };
                        if let Some(font_path) = font {
                            style = style.with_font_file(&font_path)?;
                        }
                        let annotated = render::draw_boxes(&input.to_rgba8(), &boxes, &style);
                        annotated.save(&path)?;
                        println!("✓ Annotated image written to {:?}", path);
                    }
                }
                None => {
                    println!("Detection backend unavailable; no inference was run.");
                }
            }
        }

        Commands::Pull { model } => {
            let descriptor = model::registry::find(&model)?;
            let fetcher = model::CheckpointFetcher::new(&config);
            let files = fetcher.fetch(descriptor)?;

            println!("✓ Successfully pulled model: {}", model);
            println!("  Checkpoint: {:?}", files.checkpoint);
            println!("  Tokenizer: {:?}", files.tokenizer);
        }

        Commands::Serve { device, port, host } => {
            let device = parse_device(&device)?;
            let session = DetectionSession::new(&config, device);
            let state = server::AppState::new(session, device.to_string());

            println!("🚀 Grounder server starting...");
            println!("   Device: {}", device);
            println!("   Listening on: http://{}:{}", host, port);
            println!("   Health: http://{}:{}/api/health", host, port);
            println!("   Detect: http://{}:{}/api/detect", host, port);
            println!("\n   Models will be loaded on-demand when requested via API");

            server::serve(&host, port, state).await?;
        }

        Commands::List => {
            println!("Available models:\n");
            for descriptor in model::registry::all() {
                println!("  {}", descriptor.name);
                println!("    {}", descriptor.description);
                println!("    Repository: {}", descriptor.repo_id);
                println!("    Checkpoint: {}", descriptor.checkpoint);
                println!();
            }
        }
    }

    Ok(())
}
