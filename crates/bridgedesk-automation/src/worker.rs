// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Automation queue consumer.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use bridgedesk_core::types::AutomationJob;

use crate::engine::AutomationEngine;

/// Runs queued automation jobs, at most `concurrency` at a time.
pub struct AutomationWorker {
    engine: Arc<AutomationEngine>,
    queue: mpsc::Receiver<AutomationJob>,
    cancel: CancellationToken,
    permits: Arc<Semaphore>,
}

impl AutomationWorker {
    pub fn new(
        engine: Arc<AutomationEngine>,
        queue: mpsc::Receiver<AutomationJob>,
        cancel: CancellationToken,
        concurrency: usize,
    ) -> Self {
        Self {
            engine,
            queue,
            cancel,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub async fn run(mut self) {
        info!("automation worker started");
        let mut running = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("automation worker cancelled");
                    break;
                }
                job = self.queue.recv() => match job {
                    Some(job) => self.dispatch(&mut running, job).await,
                    None => {
                        info!("automation queue closed");
                        break;
                    }
                },
                Some(result) = running.join_next(), if !running.is_empty() => {
                    if let Err(e) = result {
                        error!(error = %e, "automation job panicked");
                    }
                }
            }
        }

        self.queue.close();
        while let Ok(job) = self.queue.try_recv() {
            self.dispatch(&mut running, job).await;
        }
        while let Some(result) = running.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "automation job panicked");
            }
        }
        info!("automation worker stopped");
    }

    /// Waits for a free slot, then runs `job` on the set.
    async fn dispatch(&self, running: &mut JoinSet<()>, job: AutomationJob) {
        let permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                error!("automation semaphore closed");
                return;
            }
        };
        let engine = Arc::clone(&self.engine);
        running.spawn(async move {
            let _permit = permit;
            match engine.process(&job).await {
                Ok(Some(execution)) => debug!(
                    execution_id = execution.id,
                    status = %execution.status,
                    "automation job finished"
                ),
                Ok(None) => {}
                Err(e) => error!(
                    conversation_id = %job.conversation.id,
                    message_id = %job.message.id,
                    error = %e,
                    "automation job failed"
                ),
            }
        });
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
