//! Fan-out of change records to registered transport sinks.

use stagelink_types::Envelope;
use tokio::sync::mpsc;

/// One labeled subscription feeding a transport adapter.
#[derive(Debug)]
struct Sink {
    label: String,
    filter: Option<String>,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl Sink {
    fn accepts(&self, path: &str) -> bool {
        self.filter.as_deref().is_none_or(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// Fans freshly emitted envelopes out to registered sinks.
///
/// Each sink drains its own unbounded queue, so a slow consumer never
/// delays another; delivery order within one sink is FIFO. A sink whose
/// receiver has been dropped is pruned on the next publish.
#[derive(Debug, Default)]
pub struct Relay {
    sinks: Vec<Sink>,
}

impl Relay {
    /// Register a sink under a transport label and hand back its queue.
    ///
    /// `filter` restricts delivery to envelopes whose path equals the
    /// given prefix or addresses something below it.
    pub fn register(
        &mut self,
        label: impl Into<String>,
        filter: Option<String>,
    ) -> mpsc::UnboundedReceiver<Envelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        let label = label.into();
        tracing::debug!(sink = %label, filter = ?filter, "sink registered");
        self.sinks.push(Sink { label, filter, tx });
        rx
    }

    /// Deliver an envelope to every live matching sink. Returns the
    /// number of deliveries.
    pub fn publish(&mut self, envelope: &Envelope) -> usize {
        self.fan_out(None, envelope)
    }

    /// Deliver to every live matching sink except those labeled with the
    /// originating transport, so an applied envelope is never echoed back
    /// where it came from.
    pub fn publish_except(&mut self, origin: &str, envelope: &Envelope) -> usize {
        self.fan_out(Some(origin), envelope)
    }

    fn fan_out(&mut self, skip: Option<&str>, envelope: &Envelope) -> usize {
        let mut delivered = 0_usize;
        self.sinks.retain(|sink| {
            if skip == Some(sink.label.as_str()) || !sink.accepts(&envelope.path) {
                return true;
            }
            if sink.tx.send(envelope.clone()).is_ok() {
                delivered = delivered.saturating_add(1);
                true
            } else {
                tracing::debug!(sink = %sink.label, "sink closed, pruning");
                false
            }
        });
        delivered
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
