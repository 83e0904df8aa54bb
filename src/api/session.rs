use parking_lot::RwLock;
use std::collections::HashMap;

/// Login tickets issued by this process
#[derive(Debug, Default)]
pub struct SessionRegistry {
    tickets: RwLock<HashMap<String, String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh ticket for `username`
    pub fn issue(&self, username: &str) -> String {
        let ticket = format!("TICKET_{}", uuid::Uuid::new_v4().simple());
        self.tickets
            .write()
            .insert(ticket.clone(), username.to_string());
        ticket
    }

    /// Username a ticket was issued to. Accepts the URI-encoded form clients
    /// were handed as well as the raw ticket.
    pub fn resolve(&self, ticket: &str) -> Option<String> {
        let decoded = urlencoding::decode(ticket).ok()?;
        self.tickets.read().get(decoded.as_ref()).cloned()
    }
}

/// Wire form of a ticket
pub fn encode_ticket(ticket: &str) -> String {
    urlencoding::encode(ticket).into_owned()
}
