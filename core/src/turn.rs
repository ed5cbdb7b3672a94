use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::client::{CompletionClient, OpenRouterClient};
use crate::config::{ServiceConfig, TurnPolicy};
use crate::errors::{GenieError, GenieResult};
use crate::prompt::{build_turn_prompt, build_undo_prompt, TURN_DIRECTIVE, UNDO_DIRECTIVE};
use crate::reply::{decode_reply, ReplyShape};
use crate::types::{ChatCompletionRequest, HistoryEntry, ModelReply};

/// Turns client-held history into one constrained completion request and
/// validates what comes back. Holds no per-conversation state.
#[derive(Clone)]
pub struct TurnProcessor {
    config: Arc<ServiceConfig>,
    client: Option<Arc<dyn CompletionClient>>,
}

impl TurnProcessor {
    pub fn new(config: Arc<ServiceConfig>, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            config,
            client: Some(client),
        }
    }

    /// Build the processor with the real completion client. Without a
    /// credential the processor still exists but every call fails with
    /// `Configuration` before touching the network.
    pub fn from_config(config: ServiceConfig) -> GenieResult<Self> {
        let client: Option<Arc<dyn CompletionClient>> = if config.is_configured() {
            Some(Arc::new(OpenRouterClient::new(&config)?))
        } else {
            None
        };
        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn client(&self) -> GenieResult<&Arc<dyn CompletionClient>> {
        match &self.client {
            Some(client) if self.config.is_configured() => Ok(client),
            _ => Err(GenieError::Configuration(
                "completion service API key is not configured".to_string(),
            )),
        }
    }

    /// Advance the dialogue: the next question, or the final answer.
    pub async fn next_turn(&self, history: &[HistoryEntry]) -> GenieResult<ModelReply> {
        let span = info_span!("next_turn", request_id = %Uuid::new_v4(), asked = history.len());
        async move {
            let client = self.client()?;
            let request = ChatCompletionRequest::instructed(
                &self.config.model,
                build_turn_prompt(history, &self.config.policy),
                TURN_DIRECTIVE,
            );

            let raw = call(client.as_ref(), &request).await?;
            let reply = decode_logged(&raw, ReplyShape::QuestionOrAnswer)?;

            if history.is_empty() && !reply.is_question() {
                error!(raw = %raw, "Model answered on the opening turn");
                return Err(GenieError::contract("final answer on the opening turn", raw));
            }

            if past_question_limit(history.len(), &self.config.policy) && reply.is_question() {
                warn!(
                    max = self.config.policy.max_questions,
                    "Model kept asking past the question limit"
                );
            }

            let kind = if reply.is_question() { "question" } else { "answer" };
            info!(kind, "Turn processed");
            Ok(reply)
        }
        .instrument(span)
        .await
    }

    /// Undo path: drop the final entry and regenerate the question that
    /// followed the remaining history. Never yields an answer.
    pub async fn regenerate_last_turn(&self, history: &[HistoryEntry]) -> GenieResult<ModelReply> {
        let span = info_span!("regenerate_last_turn", request_id = %Uuid::new_v4(), supplied = history.len());
        async move {
            let client = self.client()?;
            let (_, truncated) = history.split_last().ok_or(GenieError::NothingToUndo)?;

            let request = ChatCompletionRequest::instructed(
                &self.config.model,
                build_undo_prompt(truncated),
                UNDO_DIRECTIVE,
            );

            let raw = call(client.as_ref(), &request).await?;
            let reply = decode_logged(&raw, ReplyShape::QuestionOnly)?;

            info!("Undo processed");
            Ok(reply)
        }
        .instrument(span)
        .await
    }
}

/// Whether `asked` questions reach the policy's limit.
fn past_question_limit(asked: usize, policy: &TurnPolicy) -> bool {
    asked >= policy.max_questions as usize
}

async fn call(client: &dyn CompletionClient, request: &ChatCompletionRequest) -> GenieResult<String> {
    match client.complete(request).await {
        Ok(raw) => {
            info!(
                provider = client.provider_name(),
                model = %client.model_name(),
                raw = %raw,
                "Completion received"
            );
            Ok(raw)
        }
        Err(GenieError::EmptyUpstreamResponse) => {
            error!(
                provider = client.provider_name(),
                model = %client.model_name(),
                "Completion service returned an empty response"
            );
            Err(GenieError::EmptyUpstreamResponse)
        }
        Err(e) => {
            error!(
                provider = client.provider_name(),
                model = %client.model_name(),
                error = %e,
                "Completion call failed"
            );
            Err(e)
        }
    }
}

fn decode_logged(raw: &str, shape: ReplyShape) -> GenieResult<ModelReply> {
    decode_reply(raw, shape).map_err(|e| {
        match &e {
            GenieError::ContractViolation { reason, raw } => {
                error!(reason = %reason, raw = %raw, "Model reply broke the output contract")
            }
            GenieError::EmptyUpstreamResponse => error!("Model reply was empty"),
            _ => {}
        }
        e
    })
}
