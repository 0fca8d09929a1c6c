use log::{info, warn};

/// Collects the recoverable problems of one cast.
///
/// Every entry also goes through the `log` facade, so a driver with a logger
/// installed sees warnings as they happen.
pub struct WarningLog {
    messages: Vec<String>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    pub fn record(&self, message: &str) {
        info!("{}", message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

impl Default for WarningLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_are_kept_in_order_and_notes_are_not() {
        let mut log = WarningLog::new();
        log.record("rotation done");
        log.warn("first");
        log.warn(String::from("second"));
        assert_eq!(log.messages(), ["first", "second"]);
        assert_eq!(log.into_messages().len(), 2);
    }
}
