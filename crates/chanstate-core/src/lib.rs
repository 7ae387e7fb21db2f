//! Client-side channel state: the channel list, the current selection, and the
//! last message seen per channel.
//!
//! [`ChannelState`] is the container. Reads live in `query`, writes in
//! `command`; `runtime` serializes both for concurrent callers. Rendering of
//! message bodies sits behind the `ports::MarkdownRenderer` boundary.

pub mod command;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod ports;
pub mod query;
pub mod runtime;
pub mod state;
pub mod transition;

pub use command::{Command, Outcome};
pub use domain::{Channel, ChannelId, MessageId};
pub use errors::{Error, Result};
pub use state::{ChannelList, ChannelState};
