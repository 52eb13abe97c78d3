//! Usage accumulation across the round-trips of one invocation.

use llmloop_core::chunk::Usage;

/// One `Usage` entry per completed model round-trip, in order.
#[derive(Debug, Clone, Default)]
pub(crate) struct UsageLedger {
    entries: Vec<Usage>,
}

impl UsageLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record the usage a provider reported for one round-trip.
    ///
    /// Several entries are merged into one; none yields a zeroed entry tagged
    /// with `provider` and `model`. Returns the recorded entry.
    pub(crate) fn record(&mut self, reported: Vec<Usage>, provider: &str, model: &str) -> Usage {
        let mut entry = Usage::empty(provider, model);
        let mut reported = reported.into_iter();
        if let Some(first) = reported.next() {
            entry = first;
            for extra in reported {
                entry.merge(&extra);
            }
            if entry.provider.is_empty() {
                entry.provider = provider.to_string();
            }
            if entry.model.is_empty() {
                entry.model = model.to_string();
            }
        }
        self.entries.push(entry.clone());
        entry
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn snapshot(&self) -> Vec<Usage> {
        self.entries.clone()
    }
}
