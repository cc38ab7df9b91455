// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rule action execution.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};

use bridgedesk_core::types::{
    ActionKind, AutomationJob, AutomationRule, ConversationState, OutboundContent, SendRequest,
    SendTarget, TIMESTAMP_FORMAT,
};
use bridgedesk_core::{BridgeError, OutboundSender, StorageAdapter};
use bridgedesk_dispatch::WebhookCaller;

use crate::template::render_template;

/// Why an action did not complete.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The dispatcher reported a failed send.
    #[error("send failed ({kind}): {message}")]
    SendFailed { kind: String, message: String },

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Executes the action half of a rule.
pub struct ActionRunner {
    outbound: Arc<dyn OutboundSender>,
    storage: Arc<dyn StorageAdapter>,
    webhook: WebhookCaller,
}

impl ActionRunner {
    pub fn new(
        outbound: Arc<dyn OutboundSender>,
        storage: Arc<dyn StorageAdapter>,
        webhook: WebhookCaller,
    ) -> Self {
        Self {
            outbound,
            storage,
            webhook,
        }
    }

    /// Runs `rule`'s action for `job`. Returns a short description of what
    /// was done, recorded as the execution detail.
    pub async fn execute(
        &self,
        rule: &AutomationRule,
        job: &AutomationJob,
        now: DateTime<FixedOffset>,
    ) -> Result<String, ActionError> {
        let param = rule.action_param.trim();
        let conversation_id = &job.conversation.id;

        match rule.action {
            ActionKind::SendMessage => {
                let text = render_template(&rule.action_param, &job.contact, now);
                let result = self
                    .outbound
                    .send(SendRequest {
                        target: SendTarget::Conversation {
                            conversation_id: conversation_id.clone(),
                        },
                        content: OutboundContent::text(text),
                    })
                    .await;
                if result.success {
                    let id = result.message_id.unwrap_or_default();
                    debug!(rule_id = rule.id, message_id = %id, "automated reply sent");
                    Ok(format!("sent {id}"))
                } else {
                    Err(ActionError::SendFailed {
                        kind: result.error_kind.unwrap_or_else(|| "internal".into()),
                        message: result.error.unwrap_or_default(),
                    })
                }
            }
            ActionKind::AssignAgent => {
                self.storage.assign_agent(conversation_id, param).await?;
                Ok(format!("assigned to {param}"))
            }
            ActionKind::ChangeStatus => {
                let state: ConversationState = param.parse().map_err(|_| {
                    BridgeError::Validation(format!("unknown conversation state {param:?}"))
                })?;
                self.storage
                    .set_conversation_state(conversation_id, state)
                    .await?;
                Ok(format!("status set to {state}"))
            }
            ActionKind::Tag => {
                self.storage.tag_contact(&job.contact.id, param).await?;
                Ok(format!("tagged {param}"))
            }
            ActionKind::CallWebhook => {
                let payload = webhook_payload(rule, job, now);
                let status = self.webhook.call(param, &payload).await?;
                info!(rule_id = rule.id, status, "automation webhook delivered");
                Ok(format!("webhook responded {status}"))
            }
        }
    }
}

/// Body posted by the `call_webhook` action.
pub fn webhook_payload(
    rule: &AutomationRule,
    job: &AutomationJob,
    now: DateTime<FixedOffset>,
) -> Value {
    json!({
        "event": "automation.triggered",
        "rule": {
            "id": rule.id,
            "name": rule.name,
            "trigger": rule.trigger,
            "action": rule.action,
        },
        "conversation": {
            "id": job.conversation.id,
            "platform": job.conversation.platform,
            "channelKind": job.conversation.channel_kind,
            "state": job.conversation.state,
            "assignedAgent": job.conversation.assigned_agent,
            "messageCount": job.conversation.message_count,
        },
        "contact": {
            "id": job.contact.id,
            "externalId": job.contact.external_id,
            "name": job.contact.name,
            "platform": job.contact.platform,
        },
        "message": {
            "id": job.message.id,
            "type": job.message.message_type,
            "content": job.message.content,
            "mediaUrl": job.message.media_url,
            "createdAt": job.message.created_at,
        },
        "timestamp": now.with_timezone(&chrono::Utc).format(TIMESTAMP_FORMAT).to_string(),
    })
}
