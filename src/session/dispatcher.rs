//! Delimiter-framed delivery to the active subscriber.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;

use crate::error::SessionError;
use crate::session::buffer::RecvBuffer;

/// Stream half of a subscription: one item per matched frame, in arrival
/// order. The stream ends after an unsubscribe or a clean disconnect; a
/// transport failure delivers one final `Err` first.
pub struct SubscriptionStream {
    rx: mpsc::UnboundedReceiver<Result<Vec<u8>, SessionError>>,
}

impl Stream for SubscriptionStream {
    type Item = Result<Vec<u8>, SessionError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

struct Subscriber {
    delimiter: Vec<u8>,
    /// Buffer offset where the next delimiter scan resumes. Bytes before it
    /// have already been scanned without a match.
    scan_from: usize,
    tx: mpsc::UnboundedSender<Result<Vec<u8>, SessionError>>,
}

/// The at-most-one subscription slot and its scan cursor.
///
/// Frames are pushed through an unbounded channel, so dispatch never blocks
/// the connection lock; the listener consumes them at its own pace outside.
pub(crate) struct Dispatcher {
    slot: Option<Subscriber>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher { slot: None }
    }

    /// Install a subscription, replacing any previous one (whose stream
    /// ends), and claim frames already sitting in the buffer.
    pub fn subscribe(&mut self, delimiter: Vec<u8>, buffer: &mut RecvBuffer) -> SubscriptionStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.slot = Some(Subscriber {
            delimiter,
            scan_from: 0,
            tx,
        });
        self.dispatch_ready(buffer);
        SubscriptionStream { rx }
    }

    /// Drop the subscription; its stream ends without an error. Idempotent.
    pub fn deactivate(&mut self) {
        self.slot = None;
    }

    /// Tear the subscription down with one final error.
    pub fn fail(&mut self, error: SessionError) {
        if let Some(sub) = self.slot.take() {
            let _ = sub.tx.send(Err(error));
        }
    }

    /// Scan newly appended data and push every complete frame, oldest
    /// first. Resumes where the previous scan left off.
    pub fn dispatch_ready(&mut self, buffer: &mut RecvBuffer) {
        let Some(sub) = self.slot.as_mut() else {
            return;
        };
        if sub.delimiter.is_empty() {
            return;
        }
        while let Some(at) = buffer.find(&sub.delimiter, sub.scan_from) {
            let frame = buffer.take(at + sub.delimiter.len());
            sub.scan_from = 0;
            if sub.tx.send(Ok(frame)).is_err() {
                // listener dropped the stream; the slot stays claimed until
                // an explicit unsubscribe or replacement
                break;
            }
        }
        sub.scan_from = buffer.resume_pos(sub.delimiter.len());
    }

    /// Account for `n` bytes drained from the front of the buffer by a
    /// direct read, keeping the scan cursor aligned.
    pub fn note_drained(&mut self, n: usize) {
        if let Some(sub) = self.slot.as_mut() {
            sub.scan_from = sub.scan_from.saturating_sub(n);
        }
    }

    /// Reset the scan cursor after the buffer was emptied.
    pub fn note_cleared(&mut self) {
        if let Some(sub) = self.slot.as_mut() {
            sub.scan_from = 0;
        }
    }
}
