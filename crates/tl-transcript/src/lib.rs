//! The in-memory transcript: an append-only, ordered sequence of
//! role-tagged messages with tool-call linkage enforced at append time
//! rather than checked after the fact.
//!
//! The step loop is the transcript's only writer; every other component
//! (the chat client, in particular) receives an immutable [`snapshot`].

use std::collections::VecDeque;

use tl_domain::{Error, Message, Result, Role, ToolCall};

/// The running conversation for one agent run.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    /// Tool calls from the most recent assistant message that have not
    /// yet been answered, in the order they must be answered.
    pending: VecDeque<ToolCall>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the transcript with an initial system/user exchange. Goes
    /// through [`append`] for each message, so the usual invariants apply —
    /// a seed can't start mid-tool-call.
    pub fn seed(messages: impl IntoIterator<Item = Message>) -> Result<Self> {
        let mut transcript = Self::new();
        for message in messages {
            transcript.append(message)?;
        }
        Ok(transcript)
    }

    /// Appends one message, enforcing the role/tool-call-linkage
    /// invariants:
    /// - An assistant message may only be appended once all tool calls
    ///   from the prior assistant message have been answered.
    /// - A tool-role message must answer the next outstanding tool call,
    ///   in order — not an arbitrary one.
    pub fn append(&mut self, message: Message) -> Result<()> {
        match message.role {
            Role::Assistant => {
                if let Some(unanswered) = self.pending.front() {
                    return Err(Error::Other(format!(
                        "cannot append assistant message: tool call {} is still awaiting a reply",
                        unanswered.id
                    )));
                }
                if let Some(calls) = &message.tool_calls {
                    tracing::debug!(pending = calls.len(), "assistant message opened tool calls");
                    self.pending = calls.iter().cloned().collect();
                }
                self.messages.push(message);
            }
            Role::Tool => {
                let expected = self.pending.front().ok_or_else(|| {
                    Error::Other("cannot append tool-role message: no tool call is outstanding".to_string())
                })?;
                match &message.tool_call_id {
                    Some(id) if *id == expected.id => {
                        self.pending.pop_front();
                        self.messages.push(message);
                    }
                    other => {
                        return Err(Error::Other(format!(
                            "tool-role message tool_call_id {other:?} does not match the next outstanding call {}",
                            expected.id
                        )));
                    }
                }
            }
            Role::System | Role::User => {
                if let Some(unanswered) = self.pending.front() {
                    return Err(Error::Other(format!(
                        "cannot append {:?} message: tool call {} is still awaiting a reply",
                        message.role, unanswered.id
                    )));
                }
                self.messages.push(message);
            }
        }
        Ok(())
    }

    /// An immutable copy of the transcript so far, for handing to the
    /// chat client. The caller's mutations (there are none — it's owned
    /// data) never reach back into this transcript.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// The tool calls from the most recent assistant message that still
    /// lack a tool-role reply, in the order they must be answered.
    pub fn pending_tool_calls(&self) -> Vec<ToolCall> {
        self.pending.iter().cloned().collect()
    }

    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
