//! Read-only views over [`ChannelState`].

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    domain::{Channel, ChannelId, MessageId},
    state::{ChannelList, ChannelState},
};

/// Full serializable picture of a session, for controllers and debugging.
#[derive(Clone, Debug, Serialize)]
pub struct StateSnapshot {
    pub selection: Option<ChannelId>,
    pub current: Option<Channel>,
    pub channels: Vec<Channel>,
    pub revision: u64,
    pub last_messages: BTreeMap<ChannelId, MessageId>,
    pub started_at: String,
}

impl ChannelState {
    /// Highest message id recorded for `id`, or zero if none was recorded.
    pub fn last_message(&self, id: &ChannelId) -> MessageId {
        self.last_messages_ref()
            .get(id)
            .cloned()
            .unwrap_or_else(MessageId::zero)
    }

    /// The selected channel, if the selection resolves against the list.
    pub fn current(&self) -> Option<&Channel> {
        let id = self.selection_ref()?;
        self.channels_ref().find(id)
    }

    pub fn list(&self) -> ChannelList {
        self.channels_ref().clone()
    }

    /// Raw selection, which may point at a channel not (yet) in the list.
    pub fn selection(&self) -> Option<&ChannelId> {
        self.selection_ref()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let channels = self.channels_ref();
        StateSnapshot {
            selection: self.selection_ref().cloned(),
            current: self.current().cloned(),
            channels: channels.to_vec(),
            revision: channels.revision(),
            last_messages: self
                .last_messages_ref()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            started_at: self.started_at().to_rfc3339(),
        }
    }
}
