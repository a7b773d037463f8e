use metrics::{counter, gauge};

/// Metrics emitted by the capture pipeline. A disabled instance records nothing.
#[derive(Debug, Clone, Copy)]
pub struct CaptureTelemetry {
    enabled: bool,
}

impl Default for CaptureTelemetry {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CaptureTelemetry {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn record_ingest(&self, outcome: &'static str) {
        if self.enabled {
            counter!("faultline_events_ingested_total", "outcome" => outcome).increment(1);
        }
    }

    pub fn record_report_sent(&self, mode: &'static str) {
        if self.enabled {
            counter!("faultline_reports_sent_total", "mode" => mode).increment(1);
        }
    }

    pub fn record_report_failure(&self, mode: &'static str, kind: &'static str) {
        if self.enabled {
            counter!("faultline_report_failures_total", "mode" => mode, "kind" => kind)
                .increment(1);
        }
    }

    pub fn record_channel_attached(&self) {
        if self.enabled {
            counter!("faultline_channel_attach_total").increment(1);
        }
    }

    pub fn record_channel_attach_failure(&self) {
        if self.enabled {
            counter!("faultline_channel_attach_failures_total").increment(1);
        }
    }

    pub fn record_enrichment_failure(&self, field: &'static str) {
        if self.enabled {
            counter!("faultline_enrichment_failures_total", "field" => field).increment(1);
        }
    }

    /// Stored dedup entries, expired ones included until a lookup or sweep drops them.
    pub fn set_dedup_entries(&self, entries: usize) {
        if self.enabled {
            gauge!("faultline_dedup_entries").set(entries as f64);
        }
    }
}
