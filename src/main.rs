// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use edgecam_supervisor::config::load_config_with_env;
use edgecam_supervisor::connectivity::ConnectivityMonitor;
use edgecam_supervisor::pipeline::FfmpegFactory;
use edgecam_supervisor::supervisor::Supervisor;

/// Edgecam Supervisor - keep a camera's capture-and-publish pipeline alive
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.yaml")]
    config: PathBuf,

    /// Capture device node (overrides config file)
    #[arg(short, long)]
    device: Option<String>,

    /// Publish URL (overrides config file)
    #[arg(short, long)]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration from file
    let mut config = load_config_with_env(&args.config)?;

    // Apply CLI overrides
    if let Some(device) = args.device {
        config.capture.device = device;
    }
    if let Some(url) = args.url {
        config.publish.url = url;
    }

    // Initialize tracing with configured level
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Edgecam Supervisor");
    info!("Loaded configuration from: {:?}", args.config);
    info!("Capture device: {}", config.capture.device);
    info!("Publish target: {}", config.publish.url);

    let probe = ConnectivityMonitor::new(
        config.probe.host.clone(),
        config.probe.port,
        Duration::from_secs(config.probe.timeout_seconds),
    );

    // Cooperative stop: Ctrl+C flips the watch, every poll tick checks it.
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, requesting stop");
            let _ = stop_tx.send(true);
        }
    });

    let mut supervisor = Supervisor::new(
        config,
        Box::new(probe),
        Box::new(FfmpegFactory),
        stop_rx,
    );

    match supervisor.run().await {
        Ok(()) => {
            info!("Supervisor stopped cleanly");
            Ok(())
        }
        Err(e) => {
            error!("Supervisor terminated: {}", e);
            std::process::exit(1);
        }
    }
}
