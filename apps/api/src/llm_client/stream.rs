//! Fragment stream: the lazy, single-pass sequence of reply text.
//!
//! A producer task pushes `StreamEvent`s into a bounded channel. The consumer pulls
//! with `FragmentStream::next` until the channel closes (clean end) or a
//! `StreamEvent::Failed` arrives (terminal error). Once either happens the stream
//! is exhausted for good.

use tokio::sync::mpsc;

use crate::llm_client::TransportError;

/// Fragments buffered between the network task and the consumer.
pub const FRAGMENT_BUFFER: usize = 64;

#[derive(Debug)]
pub enum StreamEvent {
    Fragment(String),
    Failed(TransportError),
}

/// Producer half. Dropping it closes the stream cleanly.
pub struct FragmentSender {
    tx: mpsc::Sender<StreamEvent>,
}

/// Consumer half.
pub struct FragmentStream {
    rx: mpsc::Receiver<StreamEvent>,
    exhausted: bool,
}

impl FragmentStream {
    pub fn channel(capacity: usize) -> (FragmentSender, FragmentStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            FragmentSender { tx },
            FragmentStream {
                rx,
                exhausted: false,
            },
        )
    }

    /// Builds an already-complete stream from scripted events.
    #[cfg(test)]
    pub fn scripted(events: Vec<Result<String, TransportError>>) -> Self {
        let (sender, stream) = Self::channel(events.len());
        for event in events {
            let event = match event {
                Ok(text) => StreamEvent::Fragment(text),
                Err(e) => StreamEvent::Failed(e),
            };
            // capacity == events.len(), so this never fails
            let _ = sender.tx.try_send(event);
        }
        stream
    }

    /// Next fragment, `Some(Err(_))` once on failure, then `None` forever.
    pub async fn next(&mut self) -> Option<Result<String, TransportError>> {
        if self.exhausted {
            return None;
        }

        match self.rx.recv().await {
            Some(StreamEvent::Fragment(text)) => Some(Ok(text)),
            Some(StreamEvent::Failed(e)) => {
                self.exhausted = true;
                self.rx.close();
                Some(Err(e))
            }
            None => {
                self.exhausted = true;
                None
            }
        }
    }
}

impl FragmentSender {
    /// Pushes one fragment. Returns false when the consumer is gone.
    pub async fn fragment(&self, text: String) -> bool {
        self.tx.send(StreamEvent::Fragment(text)).await.is_ok()
    }

    /// Terminates the stream with an error.
    pub async fn fail(self, error: TransportError) {
        let _ = self.tx.send(StreamEvent::Failed(error)).await;
    }
}
