use serde::{Deserialize, Serialize};

use crate::llm::Message;

/// Outcome of one finished user turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnResult {
    pub content: String,
    /// Messages appended during the turn, in transcript order.
    pub messages: Vec<Message>,
    pub tool_rounds: usize,
}
