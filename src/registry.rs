//! Session-scoped citation registry.
//!
//! Maps the id of every rendered message that carries citations to its
//! citation list, so that clicking a `[n]` reference can bring up the full
//! sources later. Entries are only ever added or cleared in bulk; an entry
//! is never modified after insertion.
//!
//! Ids come from a monotonic counter (`msg-1`, `msg-2`, …) and are unique
//! for the lifetime of the registry, independent of clock resolution. The
//! counter survives [`CitationRegistry::clear`], so an id issued before a
//! reset is never reissued afterwards.

use std::collections::HashMap;

use crate::models::{CitationList, MessageId};

const ID_PREFIX: &str = "msg-";

#[derive(Debug, Default)]
pub struct CitationRegistry {
    entries: HashMap<MessageId, CitationList>,
    next_id: u64,
}

impl CitationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `citations` under a fresh id.
    ///
    /// Returns `None` and stores nothing when the list is empty.
    pub fn register(&mut self, citations: impl Into<CitationList>) -> Option<MessageId> {
        let citations: CitationList = citations.into();
        if citations.is_empty() {
            return None;
        }
        self.next_id += 1;
        let id = MessageId::new(format!("{}{}", ID_PREFIX, self.next_id));
        self.entries.insert(id.clone(), citations);
        Some(id)
    }

    /// Citation list for `id`, or `None` when unknown (or empty).
    pub fn lookup(&self, id: &MessageId) -> Option<CitationList> {
        self.entries
            .get(id)
            .filter(|citations| !citations.is_empty())
            .cloned()
    }

    /// Drop every entry. Used on conversation reset.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
