use fl_core::{Fault, Fingerprint};
use utils::compute_content_hash;

/// Dedup identity of a fault: digest of its textual stack trace.
///
/// Faults without any trace text fall back to category and message, so that
/// unrelated trace-less faults are not folded into one.
pub fn fingerprint(fault: &Fault) -> Fingerprint {
    let trace = fault.stack_trace();
    let digest = if trace.trim().is_empty() {
        compute_content_hash(&format!("{}\n{}", fault.category(), fault.message()))
    } else {
        compute_content_hash(trace)
    };
    Fingerprint::new(digest)
}
