// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! First-match rule evaluation.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, info, warn};

use bridgedesk_core::types::{
    AutomationExecution, AutomationJob, AutomationRule, ExecutionStatus, NewExecution, NewRule,
    TriggerKind,
};
use bridgedesk_core::{
    BridgeError, Permission, Principal, StorageAdapter, authorize, parse_timestamp,
};

use crate::actions::ActionRunner;
use crate::triggers::{TriggerContext, evaluate};
use crate::validate::validate_rule;

/// Source of "now" in the operator's local offset.
pub type Clock = Arc<dyn Fn() -> DateTime<FixedOffset> + Send + Sync>;

/// The system's local clock.
pub fn local_clock() -> Clock {
    Arc::new(|| chrono::Local::now().fixed_offset())
}

pub struct AutomationEngine {
    storage: Arc<dyn StorageAdapter>,
    actions: ActionRunner,
    clock: Clock,
}

impl AutomationEngine {
    pub fn new(storage: Arc<dyn StorageAdapter>, actions: ActionRunner) -> Self {
        Self {
            storage,
            actions,
            clock: local_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Evaluates active rules for the job's platform and runs the first match.
    ///
    /// Returns the execution row written for the matched rule, or `None`
    /// when nothing matched. Action failures are recorded, not returned;
    /// only storage failures surface as errors.
    pub async fn process(
        &self,
        job: &AutomationJob,
    ) -> Result<Option<AutomationExecution>, BridgeError> {
        let platform = job.conversation.platform;
        let rules = self.storage.list_active_rules(platform).await?;
        if rules.is_empty() {
            debug!(platform = %platform, "no active rules");
            return Ok(None);
        }

        let now = (self.clock)();
        let last_outbound_at = if rules.iter().any(|r| r.trigger == TriggerKind::ResponseTime) {
            self.last_outbound_at(&job.conversation.id).await?
        } else {
            None
        };
        let ctx = TriggerContext {
            content: &job.message.content,
            message_count: job.conversation.message_count,
            last_outbound_at,
            now,
        };

        for rule in &rules {
            match evaluate(rule.trigger, &rule.trigger_param, &ctx) {
                Ok(true) => return self.run(rule, job, now).await.map(Some),
                Ok(false) => {}
                Err(e) => warn!(
                    rule_id = rule.id,
                    trigger = %rule.trigger,
                    error = %e,
                    "malformed trigger parameter, rule skipped"
                ),
            }
        }
        debug!(
            conversation_id = %job.conversation.id,
            rules = rules.len(),
            "no rule matched"
        );
        Ok(None)
    }

    async fn last_outbound_at(
        &self,
        conversation_id: &str,
    ) -> Result<Option<DateTime<chrono::Utc>>, BridgeError> {
        let raw = self.storage.last_outbound_at(conversation_id).await?;
        Ok(raw.and_then(|ts| {
            let parsed = parse_timestamp(&ts);
            if parsed.is_none() {
                warn!(conversation_id, timestamp = %ts, "unparseable outbound timestamp");
            }
            parsed
        }))
    }

    async fn run(
        &self,
        rule: &AutomationRule,
        job: &AutomationJob,
        now: DateTime<FixedOffset>,
    ) -> Result<AutomationExecution, BridgeError> {
        let (status, detail) = match self.actions.execute(rule, job, now).await {
            Ok(detail) => {
                info!(
                    rule_id = rule.id,
                    rule = %rule.name,
                    action = %rule.action,
                    conversation_id = %job.conversation.id,
                    "automation rule executed"
                );
                (ExecutionStatus::Executed, detail)
            }
            Err(e) => {
                warn!(
                    rule_id = rule.id,
                    action = %rule.action,
                    conversation_id = %job.conversation.id,
                    error = %e,
                    "automation action failed"
                );
                (ExecutionStatus::Failed, e.to_string())
            }
        };

        self.storage
            .record_execution(NewExecution {
                rule_id: rule.id,
                conversation_id: job.conversation.id.clone(),
                message_id: Some(job.message.id.clone()),
                trigger: rule.trigger,
                action: rule.action,
                status,
                detail: Some(detail),
            })
            .await
    }

    /// Validates and stores a rule. Requires [`Permission::ManageRules`].
    pub async fn create_rule(
        &self,
        principal: Option<&Principal>,
        rule: NewRule,
    ) -> Result<AutomationRule, BridgeError> {
        authorize(principal, Permission::ManageRules)?;
        validate_rule(&rule)?;
        let created = self.storage.create_rule(rule).await?;
        info!(rule_id = created.id, rule = %created.name, "automation rule created");
        Ok(created)
    }

    /// Enables or disables a rule. Requires [`Permission::ManageRules`].
    pub async fn set_rule_active(
        &self,
        principal: Option<&Principal>,
        id: i64,
        active: bool,
    ) -> Result<(), BridgeError> {
        authorize(principal, Permission::ManageRules)?;
        if self.storage.get_rule(id).await?.is_none() {
            return Err(BridgeError::not_found("rule", id.to_string()));
        }
        self.storage.set_rule_active(id, active).await
    }
}
