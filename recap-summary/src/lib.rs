// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Recap Summary
//!
//! Maintains one evolving, chronological summary per conversation from a
//! stream of digests:
//! - **Decision**: an LLM decides whether new messages continue the most
//!   recent entry or start a new one, with a deterministic fallback
//! - **Merge**: pure folding of the drafted entry into the existing log
//! - **Codec**: a human-readable markdown log that round-trips exactly
//! - **Orchestration**: per-conversation serialized read-modify-write
//!
//! # Architecture
//!
//! ```text
//!   digests ──► DigestSubscriber ──► DigestOrchestrator
//!                (per-conversation     │
//!                 ordered queues)      ├─► DocumentStore::get
//!                                      ├─► codec::parse_document / parse_entries
//!                                      ├─► DecisionEngine ──► LLMClient
//!                                      ├─► merger::apply_decision
//!                                      ├─► ConversationDirectory
//!                                      └─► codec::build_document ──► DocumentStore::upsert
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use recap_summary::{SummaryConfig, SummaryEngine, StaticConversationDirectory};
//! use recap_core::{ConversationDigest, ConversationInfo};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let directory = Arc::new(StaticConversationDirectory::new());
//!     directory
//!         .register("conv-1", ConversationInfo::new("general", "C042", "slack"))
//!         .await;
//!
//!     let config = SummaryConfig::load(None)?;
//!     let engine = SummaryEngine::from_config(config, directory, None).await?;
//!
//!     let digest = ConversationDigest::new("conv-1", 1, 2)
//!         .message("alice", "Can we ship on Friday?")
//!         .message("bob", "Yes, QA signed off.");
//!     engine.handle_digest(&digest).await?;
//!
//!     let summary = engine.get_summary("conv-1").await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod decision;
pub mod directory;
pub mod engine;
pub mod error;
pub mod llm_client;
pub mod merger;
pub mod orchestrator;
pub mod store;
pub mod subscriber;

// Re-exports
pub use codec::{build_document, parse_document, parse_entries, serialize_entries, ParsedDocument};
pub use config::{StorageBackend, SummaryConfig};
pub use decision::{DecisionEngine, DecisionOutcome, SummaryDecision};
pub use directory::{ConversationDirectory, StaticConversationDirectory};
pub use engine::{ConversationSummary, SummaryEngine};
pub use error::{SummaryError, SummaryResult};
pub use llm_client::{create_client, AnthropicClient, LLMClient, LLMError, LLMResponse, OpenAIClient};
pub use merger::manage_entries;
pub use orchestrator::{DigestOrchestrator, DigestReport};
pub use store::{DocumentStore, FileDocumentStore, InMemoryDocumentStore};
pub use subscriber::{digest_channel, DigestSubscriber, SubscriberStats};
