//! LLM-backed turn executor
//!
//! Renders the shared transcript from one agent's point of view, offers the
//! agent its transfer tools (and `fetch_page_text` when it may fetch), and
//! turns the model's reply into a [`TurnOutput`].

use super::traits::{ContentSource, LlmClient, TurnError, TurnExecutor};
use crate::llm::{ContentBlock, LlmMessage, LlmRequest, LlmResponse, MessageRole, ToolDefinition};
use crate::state_machine::{HandoffDirective, Message, TurnOutput};
use crate::swarm::{Agent, AgentName, AgentRegistry, Capability, Participant};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;

/// Model calls allowed per turn while the agent is only fetching pages
pub const MAX_TOOL_ROUNDS: usize = 4;

const TRANSFER_PREFIX: &str = "transfer_to_";
const FETCH_TOOL: &str = "fetch_page_text";
const MAX_TOKENS: u32 = 4096;

pub struct LlmTurnExecutor<L: LlmClient, C: ContentSource> {
    llm: L,
    content: C,
    /// Agent summaries quoted in transfer tool descriptions
    descriptions: HashMap<AgentName, String>,
}

impl<L: LlmClient, C: ContentSource> LlmTurnExecutor<L, C> {
    pub fn new(llm: L, content: C) -> Self {
        Self {
            llm,
            content,
            descriptions: HashMap::new(),
        }
    }

    pub fn with_descriptions_from(mut self, registry: &AgentRegistry) -> Self {
        self.descriptions = registry
            .agents()
            .map(|agent| (agent.name().clone(), agent.profile.description.clone()))
            .collect();
        self
    }

    async fn fetch(&self, url: &str) -> Result<String, String> {
        self.content
            .fetch_page_text(url)
            .await
            .map_err(|e| format!("Unable to fetch content from {url}: {e}"))
    }
}

#[async_trait]
impl<L: LlmClient, C: ContentSource> TurnExecutor for LlmTurnExecutor<L, C> {
    async fn run_turn(
        &self,
        agent: &Agent,
        history: &[Message],
        input: &Message,
    ) -> Result<TurnOutput, TurnError> {
        let mut request = LlmRequest {
            system: Some(agent.profile.system_prompt.clone()),
            messages: render_transcript(agent, history.iter().chain(std::iter::once(input))),
            tools: tool_definitions(agent, &self.descriptions),
            max_tokens: Some(MAX_TOKENS),
        };
        let mut produced = Vec::new();

        for round in 1..=MAX_TOOL_ROUNDS {
            let response = self.llm.complete(&request).await?;

            let text = response.text();
            if !text.trim().is_empty() {
                produced.push(text.trim().to_string());
            }

            if let Some(handoff) = find_handoff(agent, &response)? {
                return Ok(TurnOutput {
                    messages: produced,
                    handoff: Some(handoff),
                    terminate: false,
                });
            }

            let tool_uses = response.tool_uses();
            if tool_uses.is_empty() {
                return Ok(TurnOutput {
                    messages: produced,
                    handoff: None,
                    terminate: false,
                });
            }

            let mut results = Vec::with_capacity(tool_uses.len());
            for tool in &tool_uses {
                if tool.name != FETCH_TOOL || !agent.has_capability(Capability::FetchPage) {
                    results.push(ContentBlock::tool_result(
                        tool.id,
                        format!("Unknown tool: {}", tool.name),
                        true,
                    ));
                    continue;
                }

                let Some(url) = tool.input.get("url").and_then(|v| v.as_str()) else {
                    results.push(ContentBlock::tool_result(
                        tool.id,
                        "Missing required parameter: url",
                        true,
                    ));
                    continue;
                };

                tracing::info!(agent = %agent.name(), %url, round, "Fetching page for agent");
                match self.fetch(url).await {
                    Ok(page) => {
                        // The page text itself is the agent's contribution to the transcript
                        produced.push(page.clone());
                        results.push(ContentBlock::tool_result(tool.id, page, false));
                    }
                    Err(failure) => {
                        tracing::warn!(
                            agent = %agent.name(),
                            %url,
                            error = %failure,
                            "Page fetch failed"
                        );
                        produced.push(failure);
                        return Ok(TurnOutput {
                            messages: produced,
                            handoff: None,
                            terminate: true,
                        });
                    }
                }
            }

            request.messages.push(LlmMessage {
                role: MessageRole::Assistant,
                content: response.content.clone(),
            });
            request.messages.push(LlmMessage {
                role: MessageRole::User,
                content: results,
            });
        }

        Err(TurnError::ToolRoundsExceeded(agent.name().clone()))
    }
}

/// The first transfer call wins; a transfer outside the agent's targets is rejected
fn find_handoff(
    agent: &Agent,
    response: &LlmResponse,
) -> Result<Option<HandoffDirective>, TurnError> {
    let mut transfers = response
        .tool_uses()
        .into_iter()
        .filter_map(|tool| tool.name.strip_prefix(TRANSFER_PREFIX).map(|target| (target, tool)));

    let Some((target, tool)) = transfers.next() else {
        return Ok(None);
    };

    let ignored: Vec<&str> = transfers.map(|(target, _)| target).collect();
    if !ignored.is_empty() {
        tracing::warn!(
            agent = %agent.name(),
            chosen = target,
            ?ignored,
            "Ignoring extra transfer calls"
        );
    }

    let participant = agent
        .handoffs
        .iter()
        .find(|p| p.as_str() == target)
        .ok_or_else(|| TurnError::InvalidHandoffTarget {
            agent: agent.name().clone(),
            target: target.to_string(),
        })?;

    let mut handoff = HandoffDirective::to(participant.clone());
    if let Some(note) = tool
        .input
        .get("message")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
    {
        handoff = handoff.with_payload(note.trim());
    }
    Ok(Some(handoff))
}

fn tool_definitions(
    agent: &Agent,
    descriptions: &HashMap<AgentName, String>,
) -> Vec<ToolDefinition> {
    let mut tools: Vec<ToolDefinition> = agent
        .handoffs
        .iter()
        .map(|target| {
            let description = match target {
                Participant::User => {
                    "Give control back to the learner and wait for their reply.".to_string()
                }
                Participant::Agent(name) => match descriptions.get(name) {
                    Some(summary) => format!("Transfer control to {name}: {summary}."),
                    None => format!("Transfer control to {name}."),
                },
            };
            ToolDefinition {
                name: format!("{TRANSFER_PREFIX}{target}"),
                description,
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "message": {
                            "type": "string",
                            "description": "Optional note for the next participant"
                        }
                    }
                }),
            }
        })
        .collect();

    if agent.has_capability(Capability::FetchPage) {
        tools.push(ToolDefinition {
            name: FETCH_TOOL.to_string(),
            description: "Load a web page in a headless browser and return its text, \
                          with links written as markdown."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "Absolute http(s) URL" }
                },
                "required": ["url"]
            }),
        });
    }

    tools
}

/// Render the transcript as `agent` sees it
fn render_transcript<'a>(
    agent: &Agent,
    messages: impl Iterator<Item = &'a Message>,
) -> Vec<LlmMessage> {
    let me = Participant::Agent(agent.name().clone());
    messages
        .map(|message| match message {
            Message::Content { source, text, .. } if *source == me => LlmMessage::assistant(text),
            Message::Content { source, text, .. } => LlmMessage::user(format!("[{source}] {text}")),
            Message::Handoff {
                source,
                target,
                payload,
                ..
            } => {
                let note = match payload {
                    Some(payload) => format!("[{source} transferred to {target}: {payload}]"),
                    None => format!("[{source} transferred to {target}]"),
                };
                LlmMessage::user(note)
            }
        })
        .collect()
}
