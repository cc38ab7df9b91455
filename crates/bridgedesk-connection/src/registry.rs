// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of live session actors, keyed by account id.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use bridgedesk_core::types::SessionStatus;

use crate::actor::Command;

/// Handle to one running actor.
pub(crate) struct SessionHandle {
    pub(crate) commands: mpsc::Sender<Command>,
    pub(crate) status: watch::Receiver<SessionStatus>,
    pub(crate) task: JoinHandle<()>,
}

impl SessionHandle {
    pub(crate) fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Concurrent map of account id to session actor.
///
/// Cloning shares the same map. Reads never wait on an actor: status is
/// served from each actor's watch channel.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest published status of `account_id`, if an actor was ever started.
    pub fn status(&self, account_id: &str) -> Option<SessionStatus> {
        self.sessions
            .get(account_id)
            .map(|handle| handle.status.borrow().clone())
    }

    /// Whether an actor for `account_id` is currently running.
    pub fn is_running(&self, account_id: &str) -> bool {
        self.sessions
            .get(account_id)
            .is_some_and(|handle| handle.is_running())
    }

    /// Account ids with a registered actor, running or finished.
    pub fn account_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub(crate) fn commands(&self, account_id: &str) -> Option<mpsc::Sender<Command>> {
        self.sessions
            .get(account_id)
            .filter(|handle| handle.is_running())
            .map(|handle| handle.commands.clone())
    }

    /// Returns the status receiver of the running actor for `account_id`,
    /// or spawns one with `spawn` and registers it.
    ///
    /// The map entry stays locked while `spawn` runs, so two concurrent
    /// starts cannot create two actors for one account.
    pub(crate) fn get_or_spawn(
        &self,
        account_id: &str,
        spawn: impl FnOnce() -> SessionHandle,
    ) -> (watch::Receiver<SessionStatus>, bool) {
        match self.sessions.entry(account_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_running() {
                    (entry.get().status.clone(), false)
                } else {
                    let handle = spawn();
                    let status = handle.status.clone();
                    entry.insert(handle);
                    (status, true)
                }
            }
            Entry::Vacant(entry) => {
                let handle = spawn();
                let status = handle.status.clone();
                entry.insert(handle);
                (status, true)
            }
        }
    }

    pub(crate) fn remove(&self, account_id: &str) -> Option<SessionHandle> {
        self.sessions.remove(account_id).map(|(_, handle)| handle)
    }
}
