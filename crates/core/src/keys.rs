// crates/core/src/keys.rs
//! Cache key scheme for polled resources.
//!
//! Keys are plain tuples: stable, hashable, and comparison-equal for
//! identical inputs, so cached values can be invalidated by exact key.

/// `(namespace, repository_id, analysis_id)`.
pub type QueryKey = (&'static str, String, String);

const STATUS_NAMESPACE: &str = "analysis-status";
const FINDINGS_NAMESPACE: &str = "architecture-findings";

/// Key for the full-status resource of one analysis.
pub fn status_key(repository_id: &str, analysis_id: &str) -> QueryKey {
    (
        STATUS_NAMESPACE,
        repository_id.to_string(),
        analysis_id.to_string(),
    )
}

/// Key for the architecture-findings resource. An absent analysis id
/// addresses the latest findings.
pub fn findings_key(repository_id: &str, analysis_id: Option<&str>) -> QueryKey {
    (
        FINDINGS_NAMESPACE,
        repository_id.to_string(),
        analysis_id.unwrap_or("latest").to_string(),
    )
}
