//! Owner contact lookup.

use crate::types::Contact;
use async_trait::async_trait;
use common::Result;
use dashmap::DashMap;

/// Source of owner contact details, backed by the user directory
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn find_contact(&self, owner_id: &str) -> Result<Option<Contact>>;
}

/// In-memory contact directory
#[derive(Default)]
pub struct MemoryContacts {
    contacts: DashMap<String, Contact>,
}

impl MemoryContacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contacts(contacts: impl IntoIterator<Item = Contact>) -> Self {
        let directory = Self::new();
        for contact in contacts {
            directory.upsert(contact);
        }
        directory
    }

    pub fn upsert(&self, contact: Contact) {
        self.contacts.insert(contact.owner_id.clone(), contact);
    }

    pub fn remove(&self, owner_id: &str) {
        self.contacts.remove(owner_id);
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

#[async_trait]
impl ContactDirectory for MemoryContacts {
    async fn find_contact(&self, owner_id: &str) -> Result<Option<Contact>> {
        Ok(self.contacts.get(owner_id).map(|entry| entry.value().clone()))
    }
}
