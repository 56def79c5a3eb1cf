//! Handler registry for dispatching inbound messages and status events.
//!
//! Handlers are kept in registration order per key (message id or
//! [`ConnectStatus`]) and invoked in that order. Registering returns a
//! [`HandlerId`]; passing it back removes exactly that handler.
//!
//! # Example
//!
//! ```ignore
//! use tickwire::handler::{ConnectStatus, HandlerRegistry};
//!
//! let mut registry = HandlerRegistry::new();
//!
//! let id = registry.add_message_handler(1, |m: &Move| println!("{:?}", m));
//! registry.add_status_handler(ConnectStatus::Closed, |_| println!("bye"));
//!
//! registry.remove_message_handler(id);
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;

use super::status::{ConnectStatus, StatusEvent};

/// Token returned on registration, used to remove the handler again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Trait for message handlers.
pub trait MessageHandler: Send + 'static {
    /// Handle a decoded message. Messages of another type are ignored.
    fn call(&mut self, message: &dyn Any);
}

/// Wrapper that downcasts the decoded message before calling the handler.
pub struct TypedHandler<F, M>
where
    F: FnMut(&M) + Send + 'static,
    M: 'static,
{
    handler: F,
    _phantom: PhantomData<fn(&M)>,
}

impl<F, M> TypedHandler<F, M>
where
    F: FnMut(&M) + Send + 'static,
    M: 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, M> MessageHandler for TypedHandler<F, M>
where
    F: FnMut(&M) + Send + 'static,
    M: 'static,
{
    fn call(&mut self, message: &dyn Any) {
        if let Some(message) = message.downcast_ref::<M>() {
            (self.handler)(message);
        }
    }
}

/// Boxed status callback.
pub type StatusHandler = Box<dyn FnMut(&StatusEvent) + Send>;

/// Registry of message and status handlers.
pub struct HandlerRegistry {
    /// Message handlers by message id.
    messages: HashMap<u16, Vec<(HandlerId, Box<dyn MessageHandler>)>>,
    /// Status handlers by status.
    statuses: HashMap<ConnectStatus, Vec<(HandlerId, StatusHandler)>>,
    /// Next handler id to hand out.
    next_id: u64,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            messages: HashMap::new(),
            statuses: HashMap::new(),
            next_id: 1,
        }
    }

    fn next_handler_id(&mut self) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Register a handler for messages with `message_id`.
    pub fn add_message_handler<F, M>(&mut self, message_id: u16, handler: F) -> HandlerId
    where
        F: FnMut(&M) + Send + 'static,
        M: 'static,
    {
        let id = self.next_handler_id();
        self.messages
            .entry(message_id)
            .or_default()
            .push((id, Box::new(TypedHandler::new(handler))));
        id
    }

    /// Remove a message handler. Returns false if it was not registered.
    pub fn remove_message_handler(&mut self, id: HandlerId) -> bool {
        remove_by_id(&mut self.messages, id)
    }

    /// Register a handler for a connection status.
    pub fn add_status_handler<F>(&mut self, status: ConnectStatus, handler: F) -> HandlerId
    where
        F: FnMut(&StatusEvent) + Send + 'static,
    {
        let id = self.next_handler_id();
        self.statuses
            .entry(status)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Remove a status handler. Returns false if it was not registered.
    pub fn remove_status_handler(&mut self, id: HandlerId) -> bool {
        remove_by_id(&mut self.statuses, id)
    }

    /// Invoke every handler registered for `message_id`, in order.
    ///
    /// Returns the number of handlers invoked.
    pub fn dispatch_message(&mut self, message_id: u16, message: &dyn Any) -> usize {
        match self.messages.get_mut(&message_id) {
            Some(handlers) => {
                for (_, handler) in handlers.iter_mut() {
                    handler.call(message);
                }
                handlers.len()
            }
            None => 0,
        }
    }

    /// Invoke every handler registered for the event's status, in order.
    ///
    /// Returns the number of handlers invoked.
    pub fn notify(&mut self, event: &StatusEvent) -> usize {
        match self.statuses.get_mut(&event.status()) {
            Some(handlers) => {
                for (_, handler) in handlers.iter_mut() {
                    handler(event);
                }
                handlers.len()
            }
            None => 0,
        }
    }

    /// Number of handlers registered for a message id.
    pub fn message_handler_count(&self, message_id: u16) -> usize {
        self.messages.get(&message_id).map_or(0, Vec::len)
    }

    /// Number of handlers registered for a status.
    pub fn status_handler_count(&self, status: ConnectStatus) -> usize {
        self.statuses.get(&status).map_or(0, Vec::len)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove a handler from whichever key holds it, dropping keys left empty.
fn remove_by_id<K, H>(map: &mut HashMap<K, Vec<(HandlerId, H)>>, id: HandlerId) -> bool
where
    K: std::hash::Hash + Eq + Copy,
{
    let Some(key) = map
        .iter()
        .find(|(_, handlers)| handlers.iter().any(|(h, _)| *h == id))
        .map(|(key, _)| *key)
    else {
        return false;
    };

    if let Some(handlers) = map.get_mut(&key) {
        handlers.retain(|(h, _)| *h != id);
        if handlers.is_empty() {
            map.remove(&key);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, PartialEq)]
    struct Move {
        x: f32,
    }

    fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, Arc<Mutex<Vec<T>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (log.clone(), log)
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let mut registry = HandlerRegistry::new();
        let (log, seen) = recorder::<&'static str>();

        let first = log.clone();
        registry.add_message_handler(1, move |_: &Move| first.lock().unwrap().push("first"));
        let second = log.clone();
        registry.add_message_handler(1, move |_: &Move| second.lock().unwrap().push("second"));

        let invoked = registry.dispatch_message(1, &Move { x: 1.0 });

        assert_eq!(invoked, 2);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_typed_handler_receives_message() {
        let mut registry = HandlerRegistry::new();
        let (log, seen) = recorder::<f32>();

        registry.add_message_handler(1, move |m: &Move| log.lock().unwrap().push(m.x));
        registry.dispatch_message(1, &Move { x: 3.5 });

        assert_eq!(*seen.lock().unwrap(), vec![3.5]);
    }

    #[test]
    fn test_mismatched_type_is_ignored() {
        let mut registry = HandlerRegistry::new();
        let (log, seen) = recorder::<f32>();

        registry.add_message_handler(1, move |m: &Move| log.lock().unwrap().push(m.x));
        registry.dispatch_message(1, &"not a move");

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_without_handlers() {
        let mut registry = HandlerRegistry::new();
        assert_eq!(registry.dispatch_message(9, &Move { x: 0.0 }), 0);
    }

    #[test]
    fn test_remove_message_handler() {
        let mut registry = HandlerRegistry::new();
        let (log, seen) = recorder::<&'static str>();

        let kept = log.clone();
        let id = registry.add_message_handler(1, move |_: &Move| log.lock().unwrap().push("removed"));
        registry.add_message_handler(1, move |_: &Move| kept.lock().unwrap().push("kept"));

        assert!(registry.remove_message_handler(id));
        assert!(!registry.remove_message_handler(id));
        assert_eq!(registry.message_handler_count(1), 1);

        registry.dispatch_message(1, &Move { x: 0.0 });
        assert_eq!(*seen.lock().unwrap(), vec!["kept"]);
    }

    #[test]
    fn test_remove_last_handler_drops_key() {
        let mut registry = HandlerRegistry::new();
        let id = registry.add_message_handler(1, |_: &Move| {});

        registry.remove_message_handler(id);

        assert_eq!(registry.message_handler_count(1), 0);
        assert!(registry.messages.is_empty());
    }

    #[test]
    fn test_status_handlers_by_key() {
        let mut registry = HandlerRegistry::new();
        let (log, seen) = recorder::<String>();

        let on_fail = log.clone();
        registry.add_status_handler(ConnectStatus::Failed, move |e| {
            on_fail.lock().unwrap().push(e.detail().to_string())
        });
        registry.add_status_handler(ConnectStatus::Closed, move |_| {
            log.lock().unwrap().push("closed".to_string())
        });

        assert_eq!(registry.notify(&StatusEvent::Failed("refused".into())), 1);
        assert_eq!(registry.notify(&StatusEvent::Closed), 1);
        assert_eq!(registry.notify(&StatusEvent::Succeeded), 0);

        assert_eq!(*seen.lock().unwrap(), vec!["refused", "closed"]);
    }

    #[test]
    fn test_remove_status_handler() {
        let mut registry = HandlerRegistry::new();
        let id = registry.add_status_handler(ConnectStatus::Closed, |_| {});

        assert_eq!(registry.status_handler_count(ConnectStatus::Closed), 1);
        assert!(registry.remove_status_handler(id));
        assert_eq!(registry.status_handler_count(ConnectStatus::Closed), 0);
        assert_eq!(registry.notify(&StatusEvent::Closed), 0);
    }

    #[test]
    fn test_handler_ids_are_unique_across_kinds() {
        let mut registry = HandlerRegistry::new();
        let a = registry.add_message_handler(1, |_: &Move| {});
        let b = registry.add_status_handler(ConnectStatus::Closed, |_| {});

        assert_ne!(a, b);
        assert!(!registry.remove_status_handler(a));
        assert!(!registry.remove_message_handler(b));
    }
}
