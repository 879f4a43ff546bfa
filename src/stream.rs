//! Progress as a `Stream`: bridge the blocking orchestrator to async code.
//!
//! [`progress_channel`] returns a callback to hand to the orchestrator and a
//! stream that yields one [`ProgressEvent`] per callback invocation. The
//! stream ends when the callback (and every clone of its `Arc`) is dropped,
//! i.e. when the blocking conversion task has finished.

use crate::progress::{ConversionProgress, ConversionProgressCallback};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;

/// One observable step of a conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { total: usize },
    Processed(ConversionProgress),
    ImageFailed { index: usize, total: usize },
    Completed(ConversionProgress),
}

/// A boxed stream of progress events.
pub type ProgressStream = Pin<Box<dyn Stream<Item = ProgressEvent> + Send>>;

/// Callback that forwards every event into an unbounded channel.
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    fn send(&self, event: ProgressEvent) {
        // The receiver going away only means nobody is watching any more.
        let _ = self.tx.send(event);
    }
}

impl ConversionProgressCallback for ChannelProgress {
    fn on_conversion_start(&self, total: usize) {
        self.send(ProgressEvent::Started { total });
    }

    fn on_image_processed(&self, progress: ConversionProgress) {
        self.send(ProgressEvent::Processed(progress));
    }

    fn on_image_error(&self, index: usize, total: usize, _error: &str) {
        self.send(ProgressEvent::ImageFailed { index, total });
    }

    fn on_conversion_complete(&self, progress: ConversionProgress) {
        self.send(ProgressEvent::Completed(progress));
    }
}

/// Create a connected callback / stream pair.
pub fn progress_channel() -> (Arc<ChannelProgress>, ProgressStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let stream = UnboundedReceiverStream::new(rx);
    (Arc::new(ChannelProgress { tx }), Box::pin(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn stream_yields_events_then_ends() {
        let (cb, mut stream) = progress_channel();
        let p = ConversionProgress {
            processed: 1,
            succeeded: 1,
            failed: 0,
            total: 1,
        };
        cb.on_conversion_start(1);
        cb.on_image_processed(p);
        cb.on_conversion_complete(p);
        drop(cb);

        let events: Vec<ProgressEvent> = (&mut stream).collect().await;
        assert_eq!(
            events,
            vec![
                ProgressEvent::Started { total: 1 },
                ProgressEvent::Processed(p),
                ProgressEvent::Completed(p),
            ]
        );
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn dropped_stream_does_not_break_callback() {
        let (cb, stream) = progress_channel();
        drop(stream);
        cb.on_image_error(1, 2, "bad");
    }
}
