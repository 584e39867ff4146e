//! Lifecycle events emitted by the dispatch chain.
//!
//! Subscribers are registered before serving and invoked synchronously,
//! in registration order, at three points: when a request enters the
//! chain, when the resource finder resolves a mount, and when a
//! response is about to leave the chain. Static file requests emit no
//! events.

use std::collections::HashMap;
use std::sync::Arc;

use crate::http::{HttpRequest, HttpResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewRequest,
    ResourceFound,
    NewResponse,
}

/// An event plus borrowed views of the data it concerns.
pub enum Event<'a> {
    NewRequest {
        request: &'a HttpRequest,
    },
    ResourceFound {
        request: &'a HttpRequest,
        name: &'a str,
        urlvars: &'a HashMap<String, String>,
    },
    NewResponse {
        request: &'a HttpRequest,
        response: &'a HttpResponse,
    },
}

impl Event<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::NewRequest { .. } => EventKind::NewRequest,
            Event::ResourceFound { .. } => EventKind::ResourceFound,
            Event::NewResponse { .. } => EventKind::NewResponse,
        }
    }
}

pub type Subscriber = Arc<dyn Fn(&Event<'_>) + Send + Sync>;

/// Subscriber table keyed by event kind.
#[derive(Default, Clone)]
pub struct Subscribers {
    by_kind: HashMap<EventKind, Vec<Subscriber>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, kind: EventKind, f: F)
    where
        F: Fn(&Event<'_>) + Send + Sync + 'static,
    {
        self.by_kind.entry(kind).or_default().push(Arc::new(f));
    }

    /// Invoke every subscriber registered for the event's kind.
    pub fn notify(&self, event: &Event<'_>) {
        if let Some(subscribers) = self.by_kind.get(&event.kind()) {
            for subscriber in subscribers {
                subscriber(event);
            }
        }
    }
}
