// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingest queue consumer.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use bridgedesk_core::types::IngestItem;

use crate::ingestor::Ingestor;

/// Drains the ingest queue into an [`Ingestor`].
///
/// Items are processed one at a time in arrival order, so a conversation's
/// message counters advance in the order its messages arrived.
pub struct IngestWorker {
    ingestor: Arc<Ingestor>,
    queue: mpsc::Receiver<IngestItem>,
    cancel: CancellationToken,
}

impl IngestWorker {
    pub fn new(
        ingestor: Arc<Ingestor>,
        queue: mpsc::Receiver<IngestItem>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ingestor,
            queue,
            cancel,
        }
    }

    /// Runs until cancelled or until every producer has gone away.
    pub async fn run(mut self) {
        info!("ingest worker started");
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("ingest worker cancelled");
                    break;
                }
                item = self.queue.recv() => match item {
                    Some(item) => self.handle(item).await,
                    None => {
                        info!("ingest queue closed");
                        break;
                    }
                },
            }
        }
        // Items already accepted are processed before exit.
        self.queue.close();
        while let Ok(item) = self.queue.try_recv() {
            self.handle(item).await;
        }
        info!("ingest worker stopped");
    }

    async fn handle(&self, item: IngestItem) {
        match self.ingestor.ingest(item).await {
            Ok(report) => debug!(
                stored = report.stored,
                duplicates = report.duplicates,
                statuses = report.statuses,
                failed = report.failed,
                "inbound item processed"
            ),
            Err(e) => error!(error = %e, "inbound item dropped before audit"),
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
