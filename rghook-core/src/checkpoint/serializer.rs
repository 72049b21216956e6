use super::*;

/// Versioned byte codec used by the coordinator to persist hook state.
///
/// The version is stored next to the bytes so that data written by an older
/// build can still be read after an upgrade.
pub trait VersionedSerializer<T>: Send + Sync {
    /// Version written alongside newly serialized data.
    fn version(&self) -> u32;

    fn serialize(&self, value: &T) -> HookResult<Vec<u8>>;

    fn deserialize(&self, version: u32, bytes: &[u8]) -> HookResult<T>;

    /// Frame as `[version:u32 BE][payload]`.
    fn serialize_with_version(&self, value: &T) -> HookResult<Vec<u8>> {
        let payload = self.serialize(value)?;
        let mut out = Vec::with_capacity(4 + payload.len());
        out.extend_from_slice(&self.version().to_be_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    fn deserialize_with_version(&self, framed: &[u8]) -> HookResult<T> {
        let (version, payload) = framed.split_first_chunk::<4>().ok_or_else(|| {
            HookError::Serialization(format!(
                "versioned frame too short: {} bytes",
                framed.len()
            ))
        })?;
        self.deserialize(u32::from_be_bytes(*version), payload)
    }
}

/// Serializer for [`ReaderCheckpoint`] tokens.
///
/// Delegates to the token's own byte encoding and preserves it unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointSerializer;

impl CheckpointSerializer {
    pub const VERSION: u32 = 1;

    pub fn new() -> Self {
        Self
    }
}

impl VersionedSerializer<ReaderCheckpoint> for CheckpointSerializer {
    fn version(&self) -> u32 {
        Self::VERSION
    }

    fn serialize(&self, value: &ReaderCheckpoint) -> HookResult<Vec<u8>> {
        value.to_bytes()
    }

    fn deserialize(&self, version: u32, bytes: &[u8]) -> HookResult<ReaderCheckpoint> {
        match version {
            Self::VERSION => ReaderCheckpoint::from_bytes(bytes),
            other => Err(HookError::UnsupportedVersion { version: other }),
        }
    }
}
