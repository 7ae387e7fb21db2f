//! Serialized access to a [`ChannelState`] from concurrent callers.
//!
//! A single task owns the state and applies requests in arrival order, one at
//! a time. Handles are cheap to clone and can be used from any task.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    command::{Command, Outcome},
    domain::{Channel, ChannelId, MessageId},
    errors::Error,
    query::StateSnapshot,
    state::{ChannelList, ChannelState},
    Result,
};

enum Request {
    Apply(Command, oneshot::Sender<Result<Outcome>>),
    LastMessage(ChannelId, oneshot::Sender<MessageId>),
    Current(oneshot::Sender<Option<Channel>>),
    List(oneshot::Sender<ChannelList>),
    Snapshot(oneshot::Sender<StateSnapshot>),
}

#[derive(Clone)]
pub struct StateHandle {
    tx: mpsc::Sender<Request>,
    shutdown: CancellationToken,
}

impl StateHandle {
    /// Start a session with empty state.
    ///
    /// The returned join handle yields the final state once the runtime stops
    /// (after [`StateHandle::shutdown`] or when every handle is dropped).
    pub fn spawn(queue_capacity: usize) -> (Self, JoinHandle<ChannelState>) {
        Self::spawn_with(ChannelState::new(), queue_capacity)
    }

    pub fn spawn_with(state: ChannelState, queue_capacity: usize) -> (Self, JoinHandle<ChannelState>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let shutdown = CancellationToken::new();
        let join = tokio::spawn(run(state, rx, shutdown.clone()));
        (Self { tx, shutdown }, join)
    }

    /// End the session. Requests already queued are dropped.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.tx.is_closed()
    }

    pub async fn apply(&self, cmd: Command) -> Result<Outcome> {
        let (tx, rx) = oneshot::channel();
        self.send(Request::Apply(cmd, tx)).await?;
        rx.await.map_err(|_| Error::Closed)?
    }

    pub async fn select_channel(&self, channel_id: ChannelId) -> Result<Outcome> {
        self.apply(Command::SelectChannel { channel_id }).await
    }

    pub async fn record_last_message(
        &self,
        channel_id: ChannelId,
        message_id: impl Into<String>,
    ) -> Result<Outcome> {
        self.apply(Command::RecordLastMessage {
            channel_id,
            message_id: message_id.into(),
        })
        .await
    }

    pub async fn replace_channel_list(&self, channels: Vec<Channel>) -> Result<Outcome> {
        self.apply(Command::ReplaceChannelList { channels }).await
    }

    pub async fn upsert_channel(&self, channel: Channel) -> Result<Outcome> {
        self.apply(Command::UpsertChannel { channel }).await
    }

    pub async fn remove_channel(&self, channel: Channel) -> Result<Outcome> {
        self.apply(Command::RemoveChannel { channel }).await
    }

    pub async fn last_message(&self, channel_id: ChannelId) -> Result<MessageId> {
        let (tx, rx) = oneshot::channel();
        self.send(Request::LastMessage(channel_id, tx)).await?;
        rx.await.map_err(|_| Error::Closed)
    }

    pub async fn current(&self) -> Result<Option<Channel>> {
        let (tx, rx) = oneshot::channel();
        self.send(Request::Current(tx)).await?;
        rx.await.map_err(|_| Error::Closed)
    }

    pub async fn list(&self) -> Result<ChannelList> {
        let (tx, rx) = oneshot::channel();
        self.send(Request::List(tx)).await?;
        rx.await.map_err(|_| Error::Closed)
    }

    pub async fn snapshot(&self) -> Result<StateSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Request::Snapshot(tx)).await?;
        rx.await.map_err(|_| Error::Closed)
    }

    async fn send(&self, req: Request) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::Closed);
        }
        self.tx.send(req).await.map_err(|_| Error::Closed)
    }
}

async fn run(
    mut state: ChannelState,
    mut rx: mpsc::Receiver<Request>,
    shutdown: CancellationToken,
) -> ChannelState {
    tracing::debug!("state runtime started");
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            req = rx.recv() => match req {
                Some(req) => serve(&mut state, req),
                None => break,
            },
        }
    }
    tracing::debug!(revision = state.list().revision(), "state runtime stopped");
    state
}

// Receivers that went away just miss their reply.
fn serve(state: &mut ChannelState, req: Request) {
    match req {
        Request::Apply(cmd, reply) => {
            let _ = reply.send(state.apply(cmd));
        }
        Request::LastMessage(id, reply) => {
            let _ = reply.send(state.last_message(&id));
        }
        Request::Current(reply) => {
            let _ = reply.send(state.current().cloned());
        }
        Request::List(reply) => {
            let _ = reply.send(state.list());
        }
        Request::Snapshot(reply) => {
            let _ = reply.send(state.snapshot());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_records_converge_to_max() {
        let (handle, join) = StateHandle::spawn(4);
        let id = ChannelId::new("c1");

        let mut tasks = Vec::new();
        for batch in [["7", "3"], ["9", "5"], ["1", "8"]] {
            let h = handle.clone();
            let id = id.clone();
            tasks.push(tokio::spawn(async move {
                for m in batch {
                    h.record_last_message(id.clone(), m).await.unwrap();
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        assert_eq!(handle.last_message(id).await.unwrap(), MessageId::from(9u64));
        drop(handle);
        let state = join.await.unwrap();
        assert_eq!(state.last_message(&ChannelId::new("c1")), MessageId::from(9u64));
    }

    #[tokio::test]
    async fn queries_see_prior_commands() {
        let (handle, _join) = StateHandle::spawn(8);
        handle
            .replace_channel_list(vec![Channel::new("a"), Channel::new("b")])
            .await
            .unwrap();
        handle.select_channel(ChannelId::new("b")).await.unwrap();
        handle.upsert_channel(Channel::new("c")).await.unwrap();
        handle.remove_channel(Channel::new("a")).await.unwrap();

        let list = handle.list().await.unwrap();
        let ids: Vec<&str> = list.ids().map(ChannelId::as_str).collect();
        assert_eq!(ids, ["c", "b"]);
        assert_eq!(
            handle.current().await.unwrap().map(|c| c.id().clone()),
            Some(ChannelId::new("b"))
        );
        assert_eq!(handle.snapshot().await.unwrap().revision, list.revision());
    }

    #[tokio::test]
    async fn invalid_id_is_reported_through_handle() {
        let (handle, _join) = StateHandle::spawn(1);
        let err = handle
            .record_last_message(ChannelId::new("c1"), "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifierFormat { .. }));
        assert!(handle.last_message(ChannelId::new("c1")).await.unwrap().is_zero());
    }

    #[tokio::test]
    async fn shutdown_closes_handle() {
        let (handle, join) = StateHandle::spawn(1);
        handle.select_channel(ChannelId::new("x")).await.unwrap();
        handle.shutdown();

        let state = join.await.unwrap();
        assert_eq!(state.selection(), Some(&ChannelId::new("x")));
        assert!(handle.is_closed());
        assert!(matches!(
            handle.list().await,
            Err(Error::Closed)
        ));
    }
}
