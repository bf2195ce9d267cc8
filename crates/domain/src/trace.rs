use serde::Serialize;

/// Structured trace events emitted across all Switchyard crates.
///
/// These go to the log sink as a single JSON field and are informational
/// only; nothing reads them back for control flow.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    BackendConnected {
        tenant: String,
        backend: String,
    },
    BackendRemoved {
        tenant: String,
        backend: String,
        cooldown_secs: u64,
    },
    RebuildStarted {
        tenant: String,
        backend_count: usize,
    },
    RebuildFinished {
        tenant: String,
        operation_count: usize,
        failed_backends: usize,
        duration_ms: u64,
    },
    InvocationValidated {
        tenant: String,
        operation: String,
    },
    InvocationRejected {
        tenant: String,
        operation: String,
    },
    SanitizerRepair {
        kind: String,
        dropped: usize,
    },
    TenantEvicted {
        tenant: String,
        idle_secs: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "sy_event");
    }
}
