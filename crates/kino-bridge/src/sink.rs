//! Queuing event sink
//!
//! Sessions start producing events as soon as they are constructed, but the
//! host only starts listening later. Events produced before the first
//! listener shows up are held and flushed in order when it attaches. After
//! a listener leaves, events are dropped until the next one attaches.
//!
//! The lock is never held while a listener runs, so a listener may attach,
//! detach or emit from inside its own callback.

use crate::events::SessionEvent;
use crate::platform::{EventSink, StreamHandler};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

/// Error code used for playback failures
pub const VIDEO_ERROR_CODE: &str = "VideoError";

#[derive(Debug, Clone)]
enum Pending {
    Event(SessionEvent),
    Error { code: String, message: String },
    EndOfStream,
}

impl Pending {
    fn deliver(self, delegate: &dyn EventSink) {
        match self {
            Pending::Event(event) => delegate.emit(&event),
            Pending::Error { code, message } => delegate.fail(&code, &message),
            Pending::EndOfStream => delegate.end_of_stream(),
        }
    }
}

#[derive(Default)]
struct SinkState {
    delegate: Option<Arc<dyn EventSink>>,
    queue: VecDeque<Pending>,
    attached_once: bool,
    done: bool,
}

impl SinkState {
    fn enqueue(&mut self, item: Pending) {
        if self.done {
            return;
        }
        if self.delegate.is_none() && self.attached_once {
            trace!(?item, "No listener attached, dropping event");
            return;
        }
        self.queue.push_back(item);
    }

    // Next item to hand out, with the listener it goes to
    fn next_delivery(&mut self) -> Option<(Arc<dyn EventSink>, Pending)> {
        let delegate = self.delegate.clone()?;
        let item = self.queue.pop_front()?;
        Some((delegate, item))
    }
}

/// Event sink that buffers until a delegate attaches.
///
/// Cheap to clone; clones share the same queue and delegate.
#[derive(Clone, Default)]
pub struct QueuingEventSink {
    state: Arc<Mutex<SinkState>>,
}

impl QueuingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach or detach the downstream sink
    pub fn set_delegate(&self, delegate: Option<Arc<dyn EventSink>>) {
        {
            let mut state = self.state.lock();
            if delegate.is_some() {
                state.attached_once = true;
            } else if state.attached_once && !state.queue.is_empty() {
                trace!(dropped = state.queue.len(), "Listener left, dropping queued events");
                state.queue.clear();
            }
            state.delegate = delegate;
        }
        self.flush();
    }

    /// Queue or forward an event. `Error` events go out on the error path.
    pub fn emit(&self, event: SessionEvent) {
        match event {
            SessionEvent::Error { message } => self.error(VIDEO_ERROR_CODE, message),
            event => self.push(Pending::Event(event)),
        }
    }

    pub fn error(&self, code: impl Into<String>, message: impl Into<String>) {
        self.push(Pending::Error {
            code: code.into(),
            message: message.into(),
        });
    }

    /// Close the stream; anything sent afterwards is ignored
    pub fn end_of_stream(&self) {
        {
            let mut state = self.state.lock();
            state.enqueue(Pending::EndOfStream);
            state.done = true;
        }
        self.flush();
    }

    /// Detach and discard everything still queued. Nothing is delivered
    /// afterwards, even to a listener that attaches later.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.done = true;
        state.delegate = None;
        state.queue.clear();
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock().delegate.is_some()
    }

    /// Number of events waiting for a delegate
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn push(&self, item: Pending) {
        self.state.lock().enqueue(item);
        self.flush();
    }

    fn flush(&self) {
        loop {
            let next = self.state.lock().next_delivery();
            let Some((delegate, item)) = next else {
                break;
            };
            item.deliver(delegate.as_ref());
        }
    }
}

/// Stream handler that wires host listeners into a queuing sink
pub struct QueuingStreamHandler {
    sink: QueuingEventSink,
}

impl QueuingStreamHandler {
    pub fn new(sink: QueuingEventSink) -> Self {
        Self { sink }
    }
}

impl StreamHandler for QueuingStreamHandler {
    fn on_listen(&self, sink: Arc<dyn EventSink>) {
        self.sink.set_delegate(Some(sink));
    }

    fn on_cancel(&self) {
        self.sink.set_delegate(None);
    }
}
