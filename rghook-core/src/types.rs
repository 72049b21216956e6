/// Event time in milliseconds since epoch.
pub type EventTime = i64;

/// Checkpoint identifier assigned by the job's checkpoint coordinator.
///
/// Identifiers increase monotonically within one coordinator lifecycle; this
/// crate only uses them to derive checkpoint names.
pub type CheckpointId = u64;
