use serde::{Deserialize, Serialize};

/// Requesting identity, resolved from the session ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub ticket: Option<String>,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ticket: None,
        }
    }

    pub fn with_ticket(user_id: impl Into<String>, ticket: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ticket: Some(ticket.into()),
        }
    }
}
