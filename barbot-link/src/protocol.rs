//! Device wire protocol
//!
//! Outbound: one command line of comma-joined tokens, slot label and
//! amount alternating (`P1,60,P7,30`). Control lines are a single token
//! (`PING`, `STOP`).
//!
//! Inbound: one response per line, see [`DeviceResponse`].

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

const TOKEN_SEPARATOR: char = ',';

/// Ordered, immutable command line for the device
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandBatch {
    tokens: Vec<String>,
}

impl CommandBatch {
    pub fn builder() -> BatchBuilder {
        BatchBuilder::default()
    }

    /// Liveness probe, answered with `PONG`
    pub fn ping() -> Self {
        Self::raw(["PING"])
    }

    /// Emergency stop
    pub fn stop() -> Self {
        Self::raw(["STOP"])
    }

    /// Forward arbitrary tokens unchanged (operator console)
    pub fn raw<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Rebuild a batch from its encoded line (as persisted on an order)
    pub fn from_line(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::default();
        }
        Self::raw(line.split(TOKEN_SEPARATOR))
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Wire text without the line terminator (the codec appends `\n`)
    pub fn encode(&self) -> String {
        self.tokens.join(",")
    }
}

impl fmt::Display for CommandBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Fluent builder for pour batches
///
/// ```
/// use barbot_link::CommandBatch;
/// use rust_decimal::Decimal;
///
/// let mut builder = CommandBatch::builder();
/// builder.pour("P1", Decimal::new(6000, 2)).pour("P7", Decimal::from(30));
/// assert_eq!(builder.build().encode(), "P1,60,P7,30");
/// ```
#[derive(Debug, Default)]
pub struct BatchBuilder {
    tokens: Vec<String>,
}

impl BatchBuilder {
    /// Pour `amount` from the dispenser at `slot`
    pub fn pour(&mut self, slot: &str, amount: Decimal) -> &mut Self {
        self.tokens.push(slot.to_string());
        self.tokens.push(amount.normalize().to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn build(&self) -> CommandBatch {
        CommandBatch {
            tokens: self.tokens.clone(),
        }
    }
}

/// Classified response line from the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DeviceResponse {
    /// `OK`: command line received, not completion
    Ack,
    /// `PREPARANDO`: physical dispensing started
    Preparing,
    /// `TERMINADO`: dispensing finished
    Finished,
    /// `ERROR` or `ERROR:<msg>`
    Failed(Option<String>),
    /// `PONG`
    Pong,
}

impl DeviceResponse {
    /// Classify one line. Unknown lines yield `None` and are ignored by
    /// callers.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        match line {
            "OK" => Some(Self::Ack),
            "PREPARANDO" => Some(Self::Preparing),
            "TERMINADO" => Some(Self::Finished),
            "ERROR" => Some(Self::Failed(None)),
            "PONG" => Some(Self::Pong),
            _ => line.strip_prefix("ERROR:").map(|detail| {
                let detail = detail.trim();
                Self::Failed((!detail.is_empty()).then(|| detail.to_string()))
            }),
        }
    }

    /// Terminal responses end the in-flight order
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pour_batch_encoding() {
        let mut builder = CommandBatch::builder();
        builder
            .pour("P1", Decimal::new(6000, 2))
            .pour("P7", Decimal::new(305, 1));
        assert_eq!(builder.len(), 2);

        let batch = builder.build();
        assert_eq!(batch.encode(), "P1,60,P7,30.5");
        assert_eq!(batch.to_string(), "P1,60,P7,30.5");
    }

    #[test]
    fn test_control_batches() {
        assert_eq!(CommandBatch::ping().encode(), "PING");
        assert_eq!(CommandBatch::stop().encode(), "STOP");
        assert_eq!(CommandBatch::raw(["P3", "15"]).tokens(), ["P3", "15"]);
    }

    #[test]
    fn test_from_line() {
        let batch = CommandBatch::from_line("P1,60,P7,30\n");
        assert_eq!(batch.tokens(), ["P1", "60", "P7", "30"]);
        assert_eq!(batch.encode(), "P1,60,P7,30");

        assert!(CommandBatch::from_line("").is_empty());
        assert!(CommandBatch::from_line("  \n").is_empty());
    }

    #[test]
    fn test_empty_batch_encodes_to_empty_line() {
        assert_eq!(CommandBatch::builder().build().encode(), "");
    }

    #[test]
    fn test_parse_known_responses() {
        assert_eq!(DeviceResponse::parse("OK"), Some(DeviceResponse::Ack));
        assert_eq!(
            DeviceResponse::parse("  PREPARANDO\r"),
            Some(DeviceResponse::Preparing)
        );
        assert_eq!(
            DeviceResponse::parse("TERMINADO"),
            Some(DeviceResponse::Finished)
        );
        assert_eq!(DeviceResponse::parse("PONG"), Some(DeviceResponse::Pong));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            DeviceResponse::parse("ERROR"),
            Some(DeviceResponse::Failed(None))
        );
        assert_eq!(
            DeviceResponse::parse("ERROR:low_ice"),
            Some(DeviceResponse::Failed(Some("low_ice".to_string())))
        );
        assert_eq!(
            DeviceResponse::parse("ERROR:"),
            Some(DeviceResponse::Failed(None))
        );
        assert!(DeviceResponse::parse("ERROR:x").unwrap().is_terminal());
    }

    #[test]
    fn test_unknown_lines_are_ignored() {
        assert_eq!(DeviceResponse::parse(""), None);
        assert_eq!(DeviceResponse::parse("ok"), None);
        assert_eq!(DeviceResponse::parse("TEMP:4"), None);
        assert_eq!(DeviceResponse::parse("ERRORS"), None);
    }
}
