use super::*;

/// Prefix of every checkpoint name this hook hands to a reader group.
///
/// Distinguishes hook-triggered checkpoints from any other checkpoint names
/// living in the reader group's namespace.
pub const CHECKPOINT_NAME_PREFIX: &str = "PVG-CHK-";

/// Name under which checkpoint `checkpoint_id` is requested from the reader
/// group, e.g. `PVG-CHK-42`.
pub fn create_checkpoint_name(checkpoint_id: CheckpointId) -> String {
    format!("{CHECKPOINT_NAME_PREFIX}{checkpoint_id}")
}

/// Recover the checkpoint id from a name built by [`create_checkpoint_name`].
pub fn parse_checkpoint_id(checkpoint_name: &str) -> HookResult<CheckpointId> {
    let suffix = checkpoint_name
        .strip_prefix(CHECKPOINT_NAME_PREFIX)
        .ok_or_else(|| {
            HookError::invalid_format(
                checkpoint_name,
                format!("missing prefix '{CHECKPOINT_NAME_PREFIX}'"),
            )
        })?;

    if suffix.is_empty() {
        return Err(HookError::invalid_format(checkpoint_name, "empty checkpoint id"));
    }
    // `u64::from_str` accepts a leading '+', which the encoder never emits.
    if !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(HookError::invalid_format(
            checkpoint_name,
            "checkpoint id is not a decimal number",
        ));
    }

    suffix
        .parse::<CheckpointId>()
        .map_err(|e| HookError::invalid_format(checkpoint_name, e.to_string()))
}
