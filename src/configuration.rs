//! Environment-driven worker configuration.
use crate::amqp::configuration::{RabbitMqSettings, DEFAULT_HOST};
use crate::consumers::ProcessingPolicy;

/// The broker host.
pub const AMQP_HOST_VAR: &str = "AMQP_HOST";
/// The percentage (0-100) of orders whose dispatch is reported as failed.
pub const ERROR_PERCENT_VAR: &str = "DISPATCH_ERROR_PERCENT";
/// The maximum number of orders processed concurrently. Unset or 0 means no limit.
pub const MAX_IN_FLIGHT_VAR: &str = "DISPATCH_MAX_IN_FLIGHT";

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub rabbitmq: RabbitMqSettings,
    /// Always within `0..=100`.
    pub error_percent: u8,
    pub processing: ProcessingPolicy,
}

impl WorkerSettings {
    /// Read the settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the settings through `lookup`, which maps a variable name to its value, if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host = lookup(AMQP_HOST_VAR).unwrap_or_else(|| DEFAULT_HOST.to_owned());
        let processing = lookup(MAX_IN_FLIGHT_VAR)
            .and_then(|raw| raw.parse::<usize>().ok())
            .map_or(ProcessingPolicy::Unbounded, ProcessingPolicy::from_limit);

        Self {
            rabbitmq: RabbitMqSettings::with_host(host),
            error_percent: parse_error_percent(lookup(ERROR_PERCENT_VAR).as_deref()),
            processing,
        }
    }
}

/// Integers are clamped to `0..=100`; anything else, including a missing value, yields 0.
pub fn parse_error_percent(raw: Option<&str>) -> u8 {
    raw.and_then(|raw| raw.parse::<i64>().ok())
        .map_or(0, |percent| percent.clamp(0, 100) as u8)
}
