use crate::amqp::configuration::RabbitMqSettings;
use lapin::{uri::AMQPUri, ConnectionProperties};
use tokio::time::timeout;

#[derive(Clone)]
/// All the information required to connect to a RabbitMq broker.
pub struct ConnectionFactory {
    uri: AMQPUri,
    /// The connection target with credentials masked.
    display_uri: String,
    /// The timeout observed when trying to connect to RabbitMq.
    connection_timeout: std::time::Duration,
}

impl ConnectionFactory {
    /// Create a new connection factory from settings.
    ///
    /// A connection timeout can be (optionally) specified in `settings`.
    /// If the connection timeout is left unspecified, it will be defaulted to 10 seconds.
    pub fn new_from_config(settings: &RabbitMqSettings) -> Self {
        let connection_timeout = settings
            .connection_timeout()
            .unwrap_or_else(|| std::time::Duration::from_secs(10));
        Self {
            uri: settings.amqp_uri(),
            display_uri: settings.redacted_uri(),
            connection_timeout,
        }
    }

    /// The broker address this factory dials, safe to log.
    pub fn display_uri(&self) -> &str {
        &self.display_uri
    }

    /// Create a new connection to a RabbitMq broker.
    ///
    /// Fails if the broker cannot be reached or does not complete the handshake within the
    /// connection timeout.
    #[tracing::instrument(name = "rabbitmq_connect", skip(self), fields(uri = %self.display_uri))]
    pub async fn new_connection(&self) -> Result<lapin::Connection, anyhow::Error> {
        let properties =
            ConnectionProperties::default().with_executor(tokio_executor_trait::Tokio::current());
        let connection = timeout(
            self.connection_timeout,
            lapin::Connection::connect_uri(self.uri.clone(), properties),
        )
        .await??;
        Ok(connection)
    }
}
