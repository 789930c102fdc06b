//! Order change events pushed to subscribers.

use crate::order::{ClientId, Order, ShopId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Something that happened to an order. Carries the full order snapshot.
///
/// Serialized as `{"type": "OrderCreated", "order": {...}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrderEvent {
    /// A new order was persisted.
    OrderCreated {
        /// Order snapshot after the write.
        order: Order,
    },
    /// An existing order was modified or soft-deleted.
    OrderUpdated {
        /// Order snapshot after the write.
        order: Order,
    },
}

impl OrderEvent {
    /// The order snapshot carried by the event.
    #[must_use]
    pub const fn order(&self) -> &Order {
        match self {
            Self::OrderCreated { order } | Self::OrderUpdated { order } => order,
        }
    }

    /// Event type name, as it appears on the wire.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::OrderCreated { .. } => "OrderCreated",
            Self::OrderUpdated { .. } => "OrderUpdated",
        }
    }

    /// Whether a subscriber with `interest` should receive this event.
    #[must_use]
    pub fn concerns(&self, interest: &Interest) -> bool {
        let order = self.order();
        match interest {
            Interest::Shop(shop_id) => order.shop_id == *shop_id,
            Interest::Client(client_id) => order.client_id == *client_id,
        }
    }
}

/// What a subscriber wants to hear about.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Interest {
    /// Every order of a shop.
    Shop(ShopId),
    /// Every order of a client.
    Client(ClientId),
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shop(id) => write!(f, "shop:{id}"),
            Self::Client(id) => write!(f, "client:{id}"),
        }
    }
}
