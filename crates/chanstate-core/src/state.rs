//! The state container: storage only, no decisions.
//!
//! Mutators are crate-private so every change goes through the command layer
//! (`command.rs`), which is what keeps ids unique and pointers monotonic.

use std::{collections::HashMap, ops::Deref, sync::Arc};

use chrono::{DateTime, Utc};

use crate::domain::{Channel, ChannelId, MessageId};

/// Immutable, cheaply cloneable view of the ordered channel list.
///
/// Every list command installs a fresh `ChannelList` with a higher
/// `revision`, so holders of an older view are never affected and observers
/// can detect change by comparing revisions.
#[derive(Clone, Debug)]
pub struct ChannelList {
    items: Arc<[Channel]>,
    revision: u64,
}

impl Default for ChannelList {
    fn default() -> Self {
        Self {
            items: Arc::from(Vec::new()),
            revision: 0,
        }
    }
}

impl ChannelList {
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn as_slice(&self) -> &[Channel] {
        &self.items
    }

    pub fn position(&self, id: &ChannelId) -> Option<usize> {
        self.items.iter().position(|c| c.id() == id)
    }

    pub fn find(&self, id: &ChannelId) -> Option<&Channel> {
        self.items.iter().find(|c| c.id() == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ChannelId> {
        self.items.iter().map(Channel::id)
    }

    /// True when both views share the same backing sequence.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}

impl Deref for ChannelList {
    type Target = [Channel];

    fn deref(&self) -> &[Channel] {
        &self.items
    }
}

/// Per-session channel state.
///
/// One instance per session; create it with [`ChannelState::new`] and drop it
/// when the session ends.
#[derive(Debug)]
pub struct ChannelState {
    selection: Option<ChannelId>,
    channels: ChannelList,
    // Kept apart from `channels` so message traffic never rebuilds channel records.
    last_messages: HashMap<ChannelId, MessageId>,
    started_at: DateTime<Utc>,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelState {
    pub fn new() -> Self {
        Self {
            selection: None,
            channels: ChannelList::default(),
            last_messages: HashMap::new(),
            started_at: Utc::now(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub(crate) fn selection_ref(&self) -> Option<&ChannelId> {
        self.selection.as_ref()
    }

    pub(crate) fn channels_ref(&self) -> &ChannelList {
        &self.channels
    }

    pub(crate) fn last_messages_ref(&self) -> &HashMap<ChannelId, MessageId> {
        &self.last_messages
    }

    pub(crate) fn set_selection(&mut self, id: ChannelId) {
        self.selection = Some(id);
    }

    /// Install a new list value. The caller guarantees id uniqueness.
    pub(crate) fn set_channels(&mut self, items: Vec<Channel>) {
        self.channels = ChannelList {
            items: items.into(),
            revision: self.channels.revision + 1,
        };
    }

    pub(crate) fn set_last_message(&mut self, id: ChannelId, message_id: MessageId) {
        self.last_messages.insert(id, message_id);
    }
}
