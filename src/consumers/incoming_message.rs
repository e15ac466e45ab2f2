use lapin::BasicProperties;

/// A received AMQP message, reduced to what the consumption loop logs and parses.
///
/// Deliveries are consumed in auto-acknowledge mode: the broker forgets about the message as soon
/// as it hands it over, so there is no acker attached.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Delivery {
    /// Contains the properties and the headers of the
    /// message.
    pub properties: BasicProperties,

    /// The payload of the message in binary format.
    pub data: Vec<u8>,
}

impl Delivery {
    /// A delivery carrying `data` and nothing else.
    pub fn with_payload(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }
}

impl From<lapin::message::Delivery> for Delivery {
    fn from(value: lapin::message::Delivery) -> Self {
        Self {
            properties: value.properties,
            data: value.data,
        }
    }
}
