//! Event streaming relay
//!
//! The session never calls into its collaborators directly. Outbound data
//! requests (`UpMsg`) and host notifications (`ViewerEvent`) are pushed into
//! relays, and the other side drains the paired receiver whenever its own
//! event loop gets to it.

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};

/// Type-safe sending half of an unbounded event channel.
///
/// Relays follow the `{source}_{event}_relay` naming pattern:
/// - `up_msg_relay` - requests toward the data source
/// - `viewer_event_relay` - notifications toward the host
#[derive(Clone, Debug)]
pub struct Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    sender: UnboundedSender<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("relay receiver has been dropped")]
    ChannelClosed,
}

impl<T> Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> (Self, UnboundedReceiver<T>) {
        let (sender, receiver) = unbounded();
        (Relay { sender }, receiver)
    }

    /// Send an event. Events sent after the receiver is gone are dropped.
    pub fn send(&self, value: T) {
        if self.sender.unbounded_send(value).is_err() {
            log::trace!("Relay receiver dropped, event discarded");
        }
    }

    pub fn try_send(&self, value: T) -> Result<(), RelayError> {
        self.sender
            .unbounded_send(value)
            .map_err(|_| RelayError::ChannelClosed)
    }

    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

impl<T> Default for Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A disconnected relay whose events are silently discarded.
    fn default() -> Self {
        let (relay, _receiver) = Self::new();
        relay
    }
}

pub fn relay<T>() -> (Relay<T>, UnboundedReceiver<T>)
where
    T: Clone + Send + Sync + 'static,
{
    Relay::new()
}

/// Collect everything currently buffered in a receiver without waiting.
pub fn drain<T>(receiver: &mut UnboundedReceiver<T>) -> Vec<T> {
    use futures::{FutureExt, StreamExt};

    let mut drained = Vec::new();
    while let Some(Some(value)) = receiver.next().now_or_never() {
        drained.push(value);
    }
    drained
}
