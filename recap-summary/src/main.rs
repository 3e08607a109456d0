// Copyright 2025 Sushanth (https://github.com/sushanthpy)
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
use recap_core::ConversationDigest;
use recap_summary::{digest_channel, StaticConversationDirectory, StorageBackend, SummaryConfig, SummaryEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Reads JSON-lines digests from stdin and folds them into summaries
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory path (overrides config file)
    #[arg(long, env = "RECAP_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Keep documents in memory only
    #[arg(long)]
    memory: bool,

    /// JSON file mapping conversation ids to channel details
    #[arg(long)]
    conversations: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = SummaryConfig::load(args.config)?;

    // Apply CLI overrides
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }
    if args.memory {
        config.storage.backend = StorageBackend::Memory;
    }
    config.validate()?;

    let metrics = recap_telemetry::init_telemetry(
        &config.telemetry.service_name,
        config.telemetry.otlp_endpoint.as_deref(),
    )?;

    let directory = match args.conversations {
        Some(path) => StaticConversationDirectory::from_file(path).await?,
        None => StaticConversationDirectory::new(),
    };
    let directory = Arc::new(directory);
    let capacity = config.subscriber.channel_capacity;
    let engine = SummaryEngine::from_config(config, directory, Some(Arc::new(metrics))).await?;

    let (sender, receiver) = digest_channel(capacity);
    let subscriber = engine.spawn_subscriber(receiver);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ConversationDigest>(line) {
            Ok(digest) => {
                if sender.send(digest).await.is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!(error = %e, "Skipping malformed digest payload"),
        }
    }
    sender.close();

    let stats = subscriber.await?;
    tracing::info!(processed = stats.processed, failed = stats.failed, "Input exhausted");
    println!("{}", serde_json::to_string(&stats)?);

    Ok(())
}
