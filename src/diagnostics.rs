use parking_lot::Mutex;
use tracing::warn;

/// Fire-and-forget notifications meant for the user, e.g. a toast in a UI host.
pub trait Diagnostics: Send + Sync {
    fn notify(&self, message: &str);
}

/// Forwards notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn notify(&self, message: &str) {
        warn!(target: "anisrc::diagnostics", "{message}");
    }
}

/// Keeps every notification so a host can display them later.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    messages: Mutex<Vec<String>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.lock())
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn notify(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_sink_keeps_order_and_drains() {
        let sink = CollectingDiagnostics::new();
        sink.notify("first");
        sink.notify("second");
        assert_eq!(sink.messages(), vec!["first", "second"]);
        assert_eq!(sink.drain().len(), 2);
        assert!(sink.messages().is_empty());
    }
}
