//! Pure list transitions. Each returns the next sequence; none mutate input.

use std::collections::HashSet;

use crate::domain::{Channel, ChannelId, MessageId};

/// Insert at the head when `channel.id` is new, otherwise replace in place.
pub fn upserted(list: &[Channel], channel: Channel) -> Vec<Channel> {
    let mut next = Vec::with_capacity(list.len() + 1);
    match list.iter().position(|c| c.id() == channel.id()) {
        Some(i) => {
            next.extend_from_slice(&list[..i]);
            next.push(channel);
            next.extend_from_slice(&list[i + 1..]);
        }
        None => {
            next.push(channel);
            next.extend_from_slice(list);
        }
    }
    next
}

/// Drop every entry whose id equals `id`.
pub fn removed(list: &[Channel], id: &ChannelId) -> Vec<Channel> {
    list.iter().filter(|c| c.id() != id).cloned().collect()
}

/// Keep the first occurrence of each id, preserving order.
///
/// Returns the deduplicated list and how many entries were dropped.
pub fn deduplicated(channels: Vec<Channel>) -> (Vec<Channel>, usize) {
    let total = channels.len();
    let mut seen = HashSet::with_capacity(total);
    let kept: Vec<Channel> = channels
        .into_iter()
        .filter(|c| seen.insert(c.id().clone()))
        .collect();
    let dropped = total - kept.len();
    (kept, dropped)
}

/// Monotonic register rule: accept only a first value or a strictly larger one.
pub fn advances(prior: Option<&MessageId>, candidate: &MessageId) -> bool {
    match prior {
        None => true,
        Some(p) => candidate > p,
    }
}
