//! In-process publish/subscribe for search lifecycle events
//!
//! The dispatcher emits `pre`, `post` and `error` events under the
//! `search` topic around every command execution. Listeners attach by
//! (topic, event name, callback, priority) at service wiring time;
//! higher priorities run first and ties run in attachment order, since
//! listeners can depend on running before/after others (tagging must
//! happen before logging).

pub mod listeners;

use std::collections::HashMap;

use crate::command::CommandResult;
use crate::error::BackendError;
use crate::params::ParamBag;

/// Topic the search service publishes under
pub const SEARCH_TOPIC: &str = "search";

/// Lifecycle phase of a command execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    /// Before the backend is invoked; params may be rewritten in place
    Pre,
    /// After a successful invocation, with the result attached
    Post,
    /// After a failed invocation, before the error is re-thrown
    Error,
}

/// One search lifecycle event
///
/// Pre listeners may mutate the command's parameters but must not
/// retarget the backend; error listeners may tag the error but cannot
/// stop its propagation.
pub enum SearchEvent<'a> {
    Pre {
        backend_id: &'a str,
        context: &'a str,
        params: &'a mut ParamBag,
    },
    Post {
        backend_id: &'a str,
        context: &'a str,
        params: &'a ParamBag,
        result: &'a CommandResult,
    },
    Error {
        backend_id: &'a str,
        context: &'a str,
        params: &'a ParamBag,
        error: &'a mut BackendError,
    },
}

impl SearchEvent<'_> {
    /// The lifecycle phase this event belongs to
    pub fn name(&self) -> EventName {
        match self {
            Self::Pre { .. } => EventName::Pre,
            Self::Post { .. } => EventName::Post,
            Self::Error { .. } => EventName::Error,
        }
    }

    /// Identifier of the backend the command targets
    pub fn backend_id(&self) -> &str {
        match self {
            Self::Pre { backend_id, .. }
            | Self::Post { backend_id, .. }
            | Self::Error { backend_id, .. } => backend_id,
        }
    }

    /// The operation name of the command being executed
    pub fn context(&self) -> &str {
        match self {
            Self::Pre { context, .. }
            | Self::Post { context, .. }
            | Self::Error { context, .. } => context,
        }
    }
}

type Listener = Box<dyn for<'a> Fn(&mut SearchEvent<'a>) + Send + Sync>;

struct Subscription {
    priority: i32,
    seq: u64,
    listener: Listener,
}

/// Typed publish/subscribe registry, built at service wiring time
#[derive(Default)]
pub struct EventBus {
    next_seq: u64,
    subscriptions: HashMap<(String, EventName), Vec<Subscription>>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener to `(topic, name)` with the given priority
    ///
    /// Higher priorities run first; equal priorities run in attachment
    /// order.
    pub fn subscribe<F>(&mut self, topic: &str, name: EventName, priority: i32, listener: F)
    where
        F: for<'a> Fn(&mut SearchEvent<'a>) + Send + Sync + 'static,
    {
        let seq = self.next_seq;
        self.next_seq += 1;
        let slot = self
            .subscriptions
            .entry((topic.to_string(), name))
            .or_default();
        slot.push(Subscription {
            priority,
            seq,
            listener: Box::new(listener),
        });
        slot.sort_by_key(|s| (std::cmp::Reverse(s.priority), s.seq));
    }

    /// Deliver `event` to every listener attached to its topic and name
    pub fn emit(&self, topic: &str, event: &mut SearchEvent<'_>) {
        let Some(subscriptions) = self.subscriptions.get(&(topic.to_string(), event.name()))
        else {
            return;
        };
        for subscription in subscriptions {
            (subscription.listener)(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_listeners_run_in_priority_order_with_stable_ties() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        for (label, priority) in [("low", 0), ("first-tie", 5), ("second-tie", 5), ("high", 10)]
        {
            let order = Arc::clone(&order);
            bus.subscribe(SEARCH_TOPIC, EventName::Pre, priority, move |_event| {
                order.lock().unwrap().push(label);
            });
        }

        let mut params = ParamBag::new();
        let mut event = SearchEvent::Pre {
            backend_id: "solr",
            context: "search",
            params: &mut params,
        };
        bus.emit(SEARCH_TOPIC, &mut event);

        assert_eq!(
            *order.lock().unwrap(),
            vec!["high", "first-tie", "second-tie", "low"]
        );
    }

    #[test]
    fn test_pre_listeners_can_rewrite_params() {
        let mut bus = EventBus::new();
        bus.subscribe(SEARCH_TOPIC, EventName::Pre, 0, |event| {
            if let SearchEvent::Pre { params, .. } = event {
                params.set("injected", "yes");
            }
        });

        let mut params = ParamBag::new();
        let mut event = SearchEvent::Pre {
            backend_id: "solr",
            context: "search",
            params: &mut params,
        };
        bus.emit(SEARCH_TOPIC, &mut event);
        assert_eq!(params.first("injected"), Some("yes"));
    }

    #[test]
    fn test_emit_with_no_listeners_is_a_no_op() {
        let bus = EventBus::new();
        let mut params = ParamBag::new();
        let mut event = SearchEvent::Pre {
            backend_id: "solr",
            context: "search",
            params: &mut params,
        };
        bus.emit(SEARCH_TOPIC, &mut event);
    }
}
