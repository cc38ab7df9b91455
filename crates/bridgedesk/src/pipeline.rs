// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service graph shared by `serve` and `replay`.
//!
//! Inbound items flow connection manager / gateway -> ingest queue ->
//! [`IngestWorker`] -> automation queue -> [`AutomationWorker`] ->
//! [`Dispatcher`].

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use bridgedesk_automation::{ActionRunner, AutomationEngine, AutomationWorker};
use bridgedesk_config::model::{AccountConfig, BridgedeskConfig};
use bridgedesk_connection::ConnectionManager;
use bridgedesk_core::types::{AccountKind, IngestItem};
use bridgedesk_core::{BridgeError, SessionConnector, StorageAdapter};
use bridgedesk_dispatch::{Dispatcher, WebhookCaller};
use bridgedesk_gateway::GatewayState;
use bridgedesk_ingest::{IngestWorker, Ingestor};

/// Writes the configured accounts into storage and applies their
/// `active` flags. Runtime columns (connection state, credentials) are kept.
pub async fn sync_accounts(
    storage: &dyn StorageAdapter,
    accounts: &[AccountConfig],
) -> Result<(), BridgeError> {
    for entry in accounts {
        storage.upsert_account(&entry.to_account()).await?;
        if entry.active {
            storage.set_active_account(entry.platform, &entry.id).await?;
        }
    }
    info!(count = accounts.len(), "configured accounts synced");
    Ok(())
}

/// Every long-lived service plus the two queue workers.
pub struct Pipeline {
    pub storage: Arc<dyn StorageAdapter>,
    pub manager: Arc<ConnectionManager>,
    pub dispatcher: Arc<Dispatcher>,
    pub engine: Arc<AutomationEngine>,
    pub ingestor: Arc<Ingestor>,
    ingest_tx: mpsc::Sender<IngestItem>,
    cancel: CancellationToken,
    automation_cancel: CancellationToken,
    ingest_worker: JoinHandle<()>,
    automation_worker: JoinHandle<()>,
}

impl Pipeline {
    /// Builds the services and spawns the workers on the current runtime.
    ///
    /// `cancel` stops intake: the gateway and the ingest worker watch it.
    /// The automation worker is stopped separately by [`Pipeline::shutdown`]
    /// once ingestion has drained.
    pub fn build(
        config: &BridgedeskConfig,
        storage: Arc<dyn StorageAdapter>,
        connector: Arc<dyn SessionConnector>,
        cancel: CancellationToken,
    ) -> Result<Self, BridgeError> {
        let (ingest_tx, ingest_rx) = mpsc::channel(config.pipeline.ingest_queue_capacity);
        let (automation_tx, automation_rx) =
            mpsc::channel(config.pipeline.automation_queue_capacity);

        let manager = ConnectionManager::new(
            storage.clone(),
            connector,
            ingest_tx.clone(),
            config.connection.clone(),
        );
        let dispatcher = Dispatcher::from_config(storage.clone(), &config.dispatch)?
            .with_sender(manager.sender());
        // Token-based accounts are validated with the same senders that
        // deliver their messages.
        let manager = [AccountKind::CloudApi, AccountKind::PageApi]
            .into_iter()
            .filter_map(|kind| dispatcher.sender(kind))
            .fold(manager, |manager, sender| manager.with_validator(sender));
        let dispatcher = Arc::new(dispatcher);

        let ingestor = Arc::new(Ingestor::from_config(
            storage.clone(),
            automation_tx,
            &config.pipeline,
        ));
        let webhook = WebhookCaller::new()?.with_timeout(config.dispatch.webhook_timeout());
        let runner = ActionRunner::new(dispatcher.clone(), storage.clone(), webhook);
        let engine = Arc::new(AutomationEngine::new(storage.clone(), runner));

        let automation_cancel = CancellationToken::new();
        let ingest_worker = IngestWorker::new(ingestor.clone(), ingest_rx, cancel.clone()).spawn();
        let automation_worker = AutomationWorker::new(
            engine.clone(),
            automation_rx,
            automation_cancel.clone(),
            config.pipeline.automation_concurrency,
        )
        .spawn();

        Ok(Self {
            storage,
            manager: Arc::new(manager),
            dispatcher,
            engine,
            ingestor,
            ingest_tx,
            cancel,
            automation_cancel,
            ingest_worker,
            automation_worker,
        })
    }

    /// Queue feeding the ingest worker.
    pub fn ingest_sender(&self) -> mpsc::Sender<IngestItem> {
        self.ingest_tx.clone()
    }

    /// State for the webhook gateway, sharing this pipeline's queue and sessions.
    pub fn gateway_state(&self) -> GatewayState {
        GatewayState::new(
            self.storage.clone(),
            self.ingest_tx.clone(),
            self.manager.registry().clone(),
        )
    }

    /// Starts every stored account concurrently and waits until each settles.
    ///
    /// Returns how many came up connected. Accounts that fail are logged
    /// and left in their reported state.
    pub async fn start_accounts(&self) -> Result<usize, BridgeError> {
        let accounts = self.storage.list_accounts().await?;
        let results = join_all(accounts.iter().map(|a| self.manager.start(&a.id))).await;

        let mut connected = 0;
        for (account, result) in accounts.iter().zip(results) {
            match result {
                Ok(start) if start.success => {
                    connected += 1;
                    info!(account_id = %account.id, platform = %account.platform, "account connected");
                }
                Ok(start) => warn!(
                    account_id = %account.id,
                    state = %start.status.state,
                    error = start.error.as_deref().unwrap_or(""),
                    "account did not connect"
                ),
                Err(e) => warn!(account_id = %account.id, error = %e, "account start failed"),
            }
        }
        info!(connected, total = accounts.len(), "accounts started");
        Ok(connected)
    }

    /// Stops every session, drains the ingest queue, then drains automation.
    ///
    /// Storage is left open for the caller to close.
    pub async fn shutdown(self) {
        let Pipeline {
            manager,
            ingestor,
            ingest_tx,
            cancel,
            automation_cancel,
            ingest_worker,
            automation_worker,
            ..
        } = self;

        manager.stop_all().await;
        cancel.cancel();
        drop(ingest_tx);
        if let Err(e) = ingest_worker.await {
            error!(error = %e, "ingest worker panicked");
        }

        // Ingestion has drained; nothing else hands off automation jobs.
        drop(ingestor);
        automation_cancel.cancel();
        if let Err(e) = automation_worker.await {
            error!(error = %e, "automation worker panicked");
        }
        info!("pipeline stopped");
    }
}
