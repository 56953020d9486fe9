//! In-process change notification bus.
//!
//! Changes to the config are published once and fanned out to every
//! transport.  Delivery is synchronous and in registration order, on the
//! publishing tick; nothing is queued.
//!
//! ```text
//! ┌──────────────┐  publish(Notification)  ┌─────────────────────┐
//! │ Dispatcher   │────────────────────────▶│ NotificationBus     │
//! │ MQTT handler │                         │  ├─▶ WS subscriber   │
//! │ Application  │                         │  ├─▶ MQTT subscriber │
//! └──────────────┘                         │  └─▶ ...             │
//!                                          └─────────────────────┘
//! ```
//!
//! Subscribers receive a [`Delivery`] that borrows the current config
//! and registry, so each one re-reads the changed bytes and encodes them
//! in its own wire form.  A subscriber must not re-publish the property
//! it is handling; debug builds assert this.

use core::cell::{Cell, RefCell};
use std::rc::Rc;

use log::warn;

use crate::config::Config;
use crate::registry::{ParameterRegistry, PropertyId};

/// Who caused a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    /// Local logic (animation, button, restart handling).
    Application,
    /// A binary-protocol client, identified by its session id.
    WebSocket(u32),
    /// The MQTT broker.
    Mqtt,
}

/// One published change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub sender: Sender,
    pub property: PropertyId,
    /// Optional extra value supplied by the publisher.
    pub arg: Option<u32>,
}

impl Notification {
    pub fn new(sender: Sender, property: PropertyId) -> Self {
        Self {
            sender,
            property,
            arg: None,
        }
    }
}

/// What a subscriber sees for each notification.
pub struct Delivery<'a> {
    pub notification: Notification,
    pub config: &'a Config,
    pub registry: &'a ParameterRegistry,
}

type Handler = Rc<RefCell<Box<dyn FnMut(&Delivery<'_>)>>>;

/// Handle returned by `subscribe*`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u32);

struct Subscription {
    id: SubscriptionId,
    /// `None` receives every property.
    filter: Option<PropertyId>,
    handler: Handler,
}

/// Typed publish/subscribe registry keyed by property id.
#[derive(Default)]
pub struct NotificationBus {
    subscriptions: RefCell<Vec<Subscription>>,
    next_id: Cell<u32>,
    dispatching: Cell<Option<PropertyId>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive only changes to `property`.
    pub fn subscribe(
        &self,
        property: PropertyId,
        handler: impl FnMut(&Delivery<'_>) + 'static,
    ) -> SubscriptionId {
        self.insert(Some(property), Box::new(handler))
    }

    /// Receive every change.
    pub fn subscribe_all(&self, handler: impl FnMut(&Delivery<'_>) + 'static) -> SubscriptionId {
        self.insert(None, Box::new(handler))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.borrow_mut();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    /// Deliver `notification` to every matching subscriber, in
    /// registration order.  Returns the number of handlers invoked.
    pub fn publish(
        &self,
        notification: Notification,
        config: &Config,
        registry: &ParameterRegistry,
    ) -> usize {
        let property = notification.property;
        let outer = self.dispatching.replace(Some(property));
        debug_assert!(
            outer != Some(property),
            "{property:?} re-published while being dispatched"
        );

        // Snapshot so handlers may (un)subscribe without aliasing the list.
        let handlers: Vec<Handler> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|s| s.filter.is_none_or(|p| p == property))
            .map(|s| Rc::clone(&s.handler))
            .collect();

        let delivery = Delivery {
            notification,
            config,
            registry,
        };

        let mut delivered = 0;
        for handler in handlers {
            match handler.try_borrow_mut() {
                Ok(mut handler) => {
                    (**handler)(&delivery);
                    delivered += 1;
                }
                Err(_) => {
                    debug_assert!(false, "subscriber re-entered while handling {property:?}");
                    warn!("Bus: subscriber busy, skipping {:?}", property);
                }
            }
        }

        self.dispatching.set(outer);
        delivered
    }

    fn insert(
        &self,
        filter: Option<PropertyId>,
        handler: Box<dyn FnMut(&Delivery<'_>)>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0.wrapping_add(1));
        self.subscriptions.borrow_mut().push(Subscription {
            id,
            filter,
            handler: Rc::new(RefCell::new(handler)),
        });
        id
    }
}
