//! Enumerated event dispatch.
//!
//! Events are routed by [`EventKind`] to an ordered list of subscribers. A
//! publish calls every subscriber of the event's kind in the order they
//! subscribed.

use std::collections::HashMap;

use winit::keyboard::KeyCode;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum EventKind {
    CloseRequested,
    Resized,
    KeyPressed,
    FramePresented,
    FrameSkipped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    CloseRequested,
    Resized { width: u32, height: u32 },
    KeyPressed(KeyCode),
    FramePresented { frame: u64, image_index: u32, suboptimal: bool },
    FrameSkipped { frame: u64, image_index: u32 },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::CloseRequested => EventKind::CloseRequested,
            Event::Resized { .. } => EventKind::Resized,
            Event::KeyPressed(_) => EventKind::KeyPressed,
            Event::FramePresented { .. } => EventKind::FramePresented,
            Event::FrameSkipped { .. } => EventKind::FrameSkipped,
        }
    }
}

type Subscriber = Box<dyn FnMut(&Event)>;

#[derive(Default)]
pub struct EventBus {
    subscribers: HashMap<EventKind, Vec<Subscriber>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<_, _> = self
            .subscribers
            .iter()
            .map(|(kind, subs)| (*kind, subs.len()))
            .collect();
        f.debug_struct("EventBus").field("subscribers", &counts).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `kind` without subscribing to it. Returns `false` if it was
    /// already known.
    pub fn register(&mut self, kind: EventKind) -> bool {
        if self.subscribers.contains_key(&kind) {
            return false;
        }
        self.subscribers.insert(kind, Vec::new());
        true
    }

    pub fn subscribe(&mut self, kind: EventKind, callback: impl FnMut(&Event) + 'static) {
        self.subscribers
            .entry(kind)
            .or_default()
            .push(Box::new(callback));
    }

    /// Calls every subscriber of `event.kind()` and returns how many ran.
    pub fn publish(&mut self, event: &Event) -> usize {
        match self.subscribers.get_mut(&event.kind()) {
            Some(subs) => {
                for sub in subs.iter_mut() {
                    sub(event);
                }
                subs.len()
            }
            None => 0,
        }
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.get(&kind).map_or(0, Vec::len)
    }

    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.subscribers.contains_key(&kind)
    }
}
