//! Order identity extraction from raw message payloads.
use serde::Deserialize;
use std::fmt;

/// The identity assigned to orders whose payload does not carry a usable `orderid`.
pub const UNKNOWN_ORDER_ID: &str = "unknown";

/// The identity of the order a message refers to.
///
/// Always resolves to a string: see [`OrderIdentity::into_order_id`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The placeholder identity for malformed payloads.
    pub fn unknown() -> Self {
        Self(UNKNOWN_ORDER_ID.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The outcome of looking for an order id inside a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderIdentity {
    /// The payload is a JSON object with a string `orderid` field.
    Known(OrderId),
    /// Anything else: invalid JSON, a JSON value that is not an object, a missing `orderid`
    /// or an `orderid` that is not a string.
    Fallback,
}

#[derive(Deserialize)]
struct OrderMessage {
    #[serde(default)]
    orderid: Option<String>,
}

impl OrderIdentity {
    /// Look for the `orderid` of a message body. Never fails.
    pub fn extract(payload: &[u8]) -> Self {
        // Go through a map first: the derived struct impl would also accept JSON arrays.
        let parsed = serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(payload)
            .and_then(|object| serde_json::from_value::<OrderMessage>(object.into()));
        match parsed {
            Ok(OrderMessage {
                orderid: Some(orderid),
            }) => Self::Known(OrderId(orderid)),
            _ => Self::Fallback,
        }
    }

    pub fn into_order_id(self) -> OrderId {
        match self {
            Self::Known(id) => id,
            Self::Fallback => OrderId::unknown(),
        }
    }
}

/// Shorthand for `OrderIdentity::extract(payload).into_order_id()`.
pub fn order_id(payload: &[u8]) -> OrderId {
    OrderIdentity::extract(payload).into_order_id()
}
