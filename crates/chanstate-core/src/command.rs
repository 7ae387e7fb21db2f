//! Command layer: the only way to change a [`ChannelState`].

use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    domain::{Channel, ChannelId, MessageId},
    state::ChannelState,
    transition, Result,
};

/// Commands dispatched by an upstream controller.
///
/// The serde form (`{"op": "upsert_channel", ...}`) is the wire format used by
/// the `chanstate` binary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    SelectChannel {
        channel_id: ChannelId,
    },
    RecordLastMessage {
        channel_id: ChannelId,
        /// Kept as text until the command runs, so a bad id surfaces as
        /// `InvalidIdentifierFormat` rather than a decode error.
        #[serde(deserialize_with = "id_text")]
        message_id: String,
    },
    ReplaceChannelList {
        channels: Vec<Channel>,
    },
    UpsertChannel {
        channel: Channel,
    },
    RemoveChannel {
        channel: Channel,
    },
}

/// What a command did. Callers may ignore it; `Unchanged` is not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    Unchanged,
}

fn id_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

impl ChannelState {
    /// Point the selection at `id`. The channel does not have to exist yet.
    pub fn select_channel(&mut self, id: ChannelId) -> Outcome {
        tracing::debug!(channel = %id, "select channel");
        self.set_selection(id);
        Outcome::Applied
    }

    /// Raise the last-seen pointer for `id` to `message_id` if it is larger.
    ///
    /// Fails only when `message_id` is not a non-negative integer, in which
    /// case nothing is changed.
    pub fn record_last_message(&mut self, id: ChannelId, message_id: &str) -> Result<Outcome> {
        let candidate = match MessageId::parse(message_id) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(channel = %id, message_id, "rejected message id");
                return Err(e);
            }
        };

        let prior = self.last_messages_ref().get(&id);
        if !transition::advances(prior, &candidate) {
            tracing::trace!(
                channel = %id,
                %candidate,
                prior = %prior.map(MessageId::as_str).unwrap_or("-"),
                "stale message id ignored"
            );
            return Ok(Outcome::Unchanged);
        }

        tracing::debug!(channel = %id, %candidate, "last message advanced");
        self.set_last_message(id, candidate);
        Ok(Outcome::Applied)
    }

    /// Replace the whole list. Duplicate ids keep their first occurrence.
    pub fn replace_channel_list(&mut self, channels: Vec<Channel>) -> Outcome {
        let (channels, dropped) = transition::deduplicated(channels);
        if dropped > 0 {
            tracing::warn!(dropped, "duplicate channel ids in replacement list");
        }
        tracing::debug!(len = channels.len(), "channel list replaced");
        self.set_channels(channels);
        Outcome::Applied
    }

    pub fn upsert_channel(&mut self, channel: Channel) -> Outcome {
        let existed = self.channels_ref().position(channel.id()).is_some();
        tracing::debug!(channel = %channel.id(), existed, "upsert channel");
        let next = transition::upserted(self.channels_ref(), channel);
        self.set_channels(next);
        Outcome::Applied
    }

    /// Remove `id` from the list. A fresh list value is installed either way.
    pub fn remove_channel(&mut self, id: &ChannelId) -> Outcome {
        let next = transition::removed(self.channels_ref(), id);
        let outcome = if next.len() == self.channels_ref().len() {
            Outcome::Unchanged
        } else {
            Outcome::Applied
        };
        tracing::debug!(channel = %id, ?outcome, "remove channel");
        self.set_channels(next);
        outcome
    }

    /// Dispatch a wire-level command.
    pub fn apply(&mut self, cmd: Command) -> Result<Outcome> {
        match cmd {
            Command::SelectChannel { channel_id } => Ok(self.select_channel(channel_id)),
            Command::RecordLastMessage {
                channel_id,
                message_id,
            } => self.record_last_message(channel_id, &message_id),
            Command::ReplaceChannelList { channels } => Ok(self.replace_channel_list(channels)),
            Command::UpsertChannel { channel } => Ok(self.upsert_channel(channel)),
            Command::RemoveChannel { channel } => Ok(self.remove_channel(channel.id())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    fn id(s: &str) -> ChannelId {
        ChannelId::new(s)
    }

    #[test]
    fn record_rejects_smaller_after_larger() {
        let mut st = ChannelState::new();
        assert_eq!(
            st.record_last_message(id("c1"), "9223372036854775807").unwrap(),
            Outcome::Applied
        );
        assert_eq!(
            st.record_last_message(id("c1"), "9223372036854775806").unwrap(),
            Outcome::Unchanged
        );
        assert_eq!(
            st.last_message(&id("c1")).as_str(),
            "9223372036854775807"
        );
    }

    #[test]
    fn record_equal_is_noop() {
        let mut st = ChannelState::new();
        st.record_last_message(id("c1"), "5").unwrap();
        assert_eq!(
            st.record_last_message(id("c1"), "005").unwrap(),
            Outcome::Unchanged
        );
    }

    #[test]
    fn record_zero_creates_entry() {
        let mut st = ChannelState::new();
        assert_eq!(
            st.record_last_message(id("c1"), "0").unwrap(),
            Outcome::Applied
        );
        assert_eq!(
            st.record_last_message(id("c1"), "0").unwrap(),
            Outcome::Unchanged
        );
    }

    #[test]
    fn record_invalid_leaves_pointer() {
        let mut st = ChannelState::new();
        st.record_last_message(id("c1"), "7").unwrap();
        let err = st.record_last_message(id("c1"), "not-a-number").unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifierFormat { .. }));
        assert_eq!(st.last_message(&id("c1")), MessageId::from(7u64));
    }

    #[test]
    fn pointers_are_per_channel() {
        let mut st = ChannelState::new();
        st.record_last_message(id("a"), "100").unwrap();
        st.record_last_message(id("b"), "1").unwrap();
        assert_eq!(st.last_message(&id("a")), MessageId::from(100u64));
        assert_eq!(st.last_message(&id("b")), MessageId::from(1u64));
    }

    #[test]
    fn replace_does_not_touch_selection_or_pointers() {
        let mut st = ChannelState::new();
        st.select_channel(id("a"));
        st.record_last_message(id("a"), "3").unwrap();
        st.replace_channel_list(vec![Channel::new("b")]);

        assert_eq!(st.selection(), Some(&id("a")));
        assert!(st.current().is_none());
        assert_eq!(st.last_message(&id("a")), MessageId::from(3u64));
    }

    #[test]
    fn remove_unknown_still_installs_new_list() {
        let mut st = ChannelState::new();
        st.replace_channel_list(vec![Channel::new("a")]);
        let before = st.list();

        assert_eq!(st.remove_channel(&id("ghost")), Outcome::Unchanged);
        let after = st.list();
        assert_eq!(before.as_slice(), after.as_slice());
        assert!(after.revision() > before.revision());
    }

    #[test]
    fn apply_decodes_wire_commands() {
        let mut st = ChannelState::new();
        let cmds = [
            r#"{"op":"replace_channel_list","channels":[{"ID":"a"},{"ID":"b"}]}"#,
            r#"{"op":"upsert_channel","channel":{"ID":"c","name":"new"}}"#,
            r#"{"op":"remove_channel","channel":{"ID":"b"}}"#,
            r#"{"op":"select_channel","channel_id":"c"}"#,
            r#"{"op":"record_last_message","channel_id":"c","message_id":"18446744073709551616"}"#,
            r#"{"op":"record_last_message","channel_id":"c","message_id":12}"#,
        ];
        for raw in cmds {
            let cmd: Command = serde_json::from_str(raw).unwrap();
            st.apply(cmd).unwrap();
        }

        let ids: Vec<_> = st.list().ids().map(|i| i.as_str().to_string()).collect();
        assert_eq!(ids, ["c", "a"]);
        assert_eq!(st.current().map(|c| c.id().as_str()), Some("c"));
        assert_eq!(st.last_message(&id("c")).as_str(), "18446744073709551616");
    }

    #[test]
    fn apply_surfaces_float_ids_as_invalid() {
        let mut st = ChannelState::new();
        let cmd: Command = serde_json::from_str(
            r#"{"op":"record_last_message","channel_id":"c","message_id":1.5}"#,
        )
        .unwrap();
        assert!(matches!(
            st.apply(cmd),
            Err(Error::InvalidIdentifierFormat { .. })
        ));
    }
}
