//! Push side of the answer stream

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::types::StreamEvent;

/// Bounded channel capacity between a generator and the transport
pub const STREAM_BUFFER: usize = 64;

/// Forwards generated fragments to the stream consumer as they arrive
///
/// A send fails once the consumer has dropped its receiver; generators treat
/// that as cancellation and stop producing.
#[derive(Debug)]
pub struct FragmentSink {
    tx: mpsc::Sender<StreamEvent>,
    fragments: usize,
}

impl FragmentSink {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self { tx, fragments: 0 }
    }

    /// Send one content fragment; empty fragments are skipped
    pub async fn push(&mut self, fragment: impl Into<String>) -> Result<()> {
        let fragment = fragment.into();
        if fragment.is_empty() {
            return Ok(());
        }

        self.send(StreamEvent::Content(fragment)).await?;
        self.fragments += 1;
        Ok(())
    }

    /// Send any event, content or terminal
    pub async fn send(&self, event: StreamEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| Error::StreamingFailure("Stream consumer disconnected".to_string()))
    }

    /// Number of content fragments delivered so far
    pub fn fragments_sent(&self) -> usize {
        self.fragments
    }

    /// Whether the consumer has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
