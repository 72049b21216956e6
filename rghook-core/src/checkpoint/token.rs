use super::*;

/// Checkpoint token produced by a reader group.
///
/// Captures the read positions of every reader in the group at the moment the
/// checkpoint was triggered. The `state` bytes belong to the reader group that
/// produced them; the hook only moves the token around and never looks inside.
/// A token must only be applied to the reader group named in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderCheckpoint {
    reader_group: String,
    name: String,
    state: Vec<u8>,
}

impl ReaderCheckpoint {
    pub fn new(reader_group: impl Into<String>, name: impl Into<String>, state: Vec<u8>) -> Self {
        Self {
            reader_group: reader_group.into(),
            name: name.into(),
            state,
        }
    }

    /// Reader group that produced this checkpoint.
    pub fn reader_group(&self) -> &str {
        &self.reader_group
    }

    /// Checkpoint name the reader group was asked for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reader-group-defined snapshot payload.
    pub fn state(&self) -> &[u8] {
        &self.state
    }

    pub fn checkpoint_id(&self) -> HookResult<CheckpointId> {
        parse_checkpoint_id(&self.name)
    }

    /// Native byte encoding of the token.
    pub fn to_bytes(&self) -> HookResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| HookError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> HookResult<Self> {
        bincode::deserialize(bytes).map_err(|e| HookError::Serialization(e.to_string()))
    }
}

impl std::fmt::Display for ReaderCheckpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{} ({} bytes)",
            self.name,
            self.reader_group,
            self.state.len()
        )
    }
}
