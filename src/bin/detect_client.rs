//! detect_client - Send an image to the person detection service.
//!
//! Picks one of the upload encodings (streamed file or base64 JSON), or
//! requests the annotated image and saves it. Service URL and timeouts come
//! from `DETECT_CONFIG` / `DETECT_*` unless `--api-url` is given.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use person_detect_client::{ClientConfig, DetectionClient, DetectionResult};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Detect people in an image using the remote detection service"
)]
struct Args {
    /// Service base URL (overrides the config file).
    #[arg(long, env = "DETECT_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream the raw image file to /detect.
    File {
        image: PathBuf,
        /// Confidence threshold, forwarded as-is.
        #[arg(long, default_value = "0.7")]
        threshold: f64,
    },
    /// Send the image base64-encoded in a JSON body to /detect.
    Base64 {
        image: PathBuf,
        #[arg(long, default_value = "0.7")]
        threshold: f64,
    },
    /// Request the annotated image and save it.
    Visualize {
        image: PathBuf,
        #[arg(long, default_value = "0.7")]
        threshold: f64,
        /// Where to write the annotated image.
        #[arg(long, default_value = "resultado_detecciones.jpg")]
        output: PathBuf,
    },
    /// Check service availability.
    Health,
    /// Show service metadata.
    Info,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = ClientConfig::load()?;
    if let Some(url) = args.api_url.as_deref() {
        cfg.set_base_url(url)?;
    }
    log::info!("detection service: {}", cfg.base_url());
    let client = DetectionClient::new(cfg);

    match args.command {
        Command::File { image, threshold } => {
            report(client.detect_from_file(&image, threshold))
        }
        Command::Base64 { image, threshold } => {
            report(client.detect_from_base64(&image, threshold))
        }
        Command::Visualize {
            image,
            threshold,
            output,
        } => {
            let outcome = client.detect_with_visualization(&image, threshold);
            let Some(result) = outcome.result() else {
                return Err(anyhow!(
                    "detection failed: {}",
                    outcome.error().unwrap_or("unknown error")
                ));
            };
            println!("{}", result);
            outcome.save_image(&output)?;
            println!("Annotated image saved: {}", output.display());
            Ok(())
        }
        Command::Health => {
            let health = client.health()?;
            println!(
                "status: {} (model loaded: {})",
                health.status, health.model_loaded
            );
            Ok(())
        }
        Command::Info => {
            let info = client.info()?;
            println!("{} v{}", info.name, info.version);
            if let Some(model) = &info.model {
                println!("model: {}", model);
            }
            if let Some(dataset) = &info.dataset {
                println!("dataset: {}", dataset);
            }
            if let Some(size) = info.input_size {
                println!("input size: {}x{}", size, size);
            }
            for (endpoint, description) in &info.endpoints {
                println!("  {}  {}", endpoint, description);
            }
            Ok(())
        }
    }
}

fn report(result: DetectionResult) -> Result<()> {
    if let Some(error) = result.error() {
        return Err(anyhow!("detection failed: {}", error));
    }
    println!("{}", result);
    Ok(())
}
