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

//! Digest subscriber
//!
//! Consumes digests from a channel. Digests of one conversation are
//! processed strictly in arrival order, one at a time; different
//! conversations run concurrently up to a configured limit.

use crate::error::SummaryResult;
use crate::orchestrator::{DigestOrchestrator, DigestReport};
use async_channel::{Receiver, Sender};
use recap_core::ConversationDigest;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};

/// Create the inbound digest channel
pub fn digest_channel(capacity: usize) -> (Sender<ConversationDigest>, Receiver<ConversationDigest>) {
    async_channel::bounded(capacity.max(1))
}

/// Counts reported when a subscriber shuts down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubscriberStats {
    pub processed: u64,
    pub failed: u64,
}

type TaskOutcome = (String, Result<SummaryResult<DigestReport>, JoinError>);

/// Feeds digests from a channel into the orchestrator
pub struct DigestSubscriber {
    orchestrator: Arc<DigestOrchestrator>,
    max_concurrent: usize,
    queues: HashMap<String, VecDeque<ConversationDigest>>,
    active: HashSet<String>,
    waiting: VecDeque<String>,
    tasks: JoinSet<TaskOutcome>,
    stats: SubscriberStats,
}

impl DigestSubscriber {
    pub fn new(orchestrator: Arc<DigestOrchestrator>, max_concurrent: usize) -> Self {
        Self {
            orchestrator,
            max_concurrent: max_concurrent.max(1),
            queues: HashMap::new(),
            active: HashSet::new(),
            waiting: VecDeque::new(),
            tasks: JoinSet::new(),
            stats: SubscriberStats::default(),
        }
    }

    /// Run until the channel is closed and drained and all work has finished
    pub async fn run(mut self, receiver: Receiver<ConversationDigest>) -> SubscriberStats {
        tracing::info!(max_concurrent = self.max_concurrent, "Digest subscriber started");
        let mut receiving = true;

        loop {
            tokio::select! {
                message = receiver.recv(), if receiving => match message {
                    Ok(digest) => self.enqueue(digest),
                    Err(_) => {
                        tracing::debug!("Digest channel closed, finishing queued work");
                        receiving = false;
                    }
                },
                Some(joined) = self.tasks.join_next() => match joined {
                    Ok(outcome) => self.complete(outcome),
                    Err(e) => {
                        // Wrapper tasks only await the inner handle
                        tracing::error!(error = %e, "Digest task wrapper failed");
                        self.stats.failed += 1;
                    }
                },
                else => break,
            }
        }

        tracing::info!(
            processed = self.stats.processed,
            failed = self.stats.failed,
            "Digest subscriber stopped"
        );
        self.stats
    }

    fn enqueue(&mut self, digest: ConversationDigest) {
        let conversation_id = digest.conversation_id.clone();
        self.queues
            .entry(conversation_id.clone())
            .or_default()
            .push_back(digest);

        if !self.active.contains(&conversation_id) && !self.waiting.contains(&conversation_id) {
            self.waiting.push_back(conversation_id);
        }
        self.fill();
    }

    fn fill(&mut self) {
        while self.active.len() < self.max_concurrent {
            let Some(conversation_id) = self.waiting.pop_front() else {
                break;
            };
            self.start(conversation_id);
        }
    }

    fn start(&mut self, conversation_id: String) {
        let Some(digest) = self
            .queues
            .get_mut(&conversation_id)
            .and_then(|queue| queue.pop_front())
        else {
            self.queues.remove(&conversation_id);
            return;
        };

        self.active.insert(conversation_id.clone());
        let orchestrator = self.orchestrator.clone();
        let handle = tokio::spawn(async move { orchestrator.handle_digest(&digest).await });
        self.tasks
            .spawn(async move { (conversation_id, handle.await) });
    }

    fn complete(&mut self, (conversation_id, result): TaskOutcome) {
        match result {
            Ok(Ok(_)) => self.stats.processed += 1,
            Ok(Err(e)) => {
                // Already logged by the orchestrator; delivery semantics belong to the bus
                tracing::debug!(conversation_id = %conversation_id, error = %e, "Digest dropped");
                self.stats.failed += 1;
            }
            Err(e) => {
                tracing::error!(conversation_id = %conversation_id, error = %e, "Digest task panicked");
                self.stats.failed += 1;
            }
        }

        self.active.remove(&conversation_id);
        if self
            .queues
            .get(&conversation_id)
            .is_some_and(|queue| !queue.is_empty())
        {
            self.waiting.push_back(conversation_id);
        } else {
            self.queues.remove(&conversation_id);
        }
        self.fill();
    }
}
