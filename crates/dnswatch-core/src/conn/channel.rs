// # Channel ClientConn
//
// Consumer that turns resolver callbacks into a stream of events.
//
// ## Purpose
//
// Lets async code consume a resolver session with `StreamExt::next()` instead
// of implementing `ClientConn` by hand. Used by the `dnswatch` CLI.
//
// ## Backpressure
//
// The channel is unbounded: a session produces at most one event per cycle
// and cycles are rate limited and backed off, so the queue only grows if the
// reader stops reading altogether. Once the stream is dropped every update is
// rejected, which pushes the session into backoff instead of resolving in a
// tight loop.

use crate::error::Error;
use crate::traits::{ClientConn, State};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// One consumer callback
#[derive(Debug)]
pub enum ResolverEvent {
    /// A resolution cycle produced this state
    StateUpdated(State),
    /// A resolution cycle failed
    Error(Error),
}

/// Consumer forwarding every callback into a channel
///
/// # Example
///
/// ```rust,no_run
/// use dnswatch_core::{ChannelClientConn, ResolverEvent};
/// use tokio_stream::StreamExt;
///
/// # async fn run(mut events: tokio_stream::wrappers::UnboundedReceiverStream<ResolverEvent>) {
/// while let Some(event) = events.next().await {
///     match event {
///         ResolverEvent::StateUpdated(state) => println!("{:?}", state.addresses),
///         ResolverEvent::Error(e) => eprintln!("{e}"),
///     }
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChannelClientConn {
    tx: mpsc::UnboundedSender<ResolverEvent>,
}

impl ChannelClientConn {
    /// Create a consumer and the stream its events arrive on
    pub fn new() -> (Self, UnboundedReceiverStream<ResolverEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, UnboundedReceiverStream::new(rx))
    }
}

impl ClientConn for ChannelClientConn {
    fn update_state(&self, state: State) -> crate::Result<()> {
        self.tx
            .send(ResolverEvent::StateUpdated(state))
            .map_err(|_| Error::rejected("event stream dropped"))
    }

    fn report_error(&self, error: Error) {
        let _ = self.tx.send(ResolverEvent::Error(error));
    }
}
