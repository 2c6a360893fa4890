use crate::models::{ChatTurn, ConversationMode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

/// Keeps only the turns that belong to `mode`, in their original order.
pub fn partition(history: &[ChatTurn], mode: ConversationMode) -> Vec<Exchange> {
    history
        .iter()
        .filter_map(|turn| match (turn, mode) {
            (ChatTurn::Plain { user, ai }, ConversationMode::Plain) => Some(Exchange {
                user: user.clone(),
                assistant: ai.clone(),
            }),
            (ChatTurn::Document { user, document }, ConversationMode::Document) => {
                Some(Exchange {
                    user: user.clone(),
                    assistant: document.clone(),
                })
            }
            _ => None,
        })
        .collect()
}
