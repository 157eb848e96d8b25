//! Arena configuration and validation.

use crate::error::ArenaError;

/// Default segment size: 64 MiB of f32 payload.
pub const DEFAULT_SEGMENT_BYTES: usize = 64 * 1024 * 1024;

/// Configuration for one process's [`Arena`](crate::Arena).
///
/// Constructed once per process at startup. Segment sizing must be
/// generous: segments are not resizable once created, and an allocation
/// larger than one segment is rejected outright.
#[derive(Clone, Debug)]
pub struct ArenaConfig {
    /// Process-group-wide segment name (matches the peers attaching to
    /// the same data plane).
    pub segment_name: String,
    /// Size of each segment in bytes. Rounded down to whole f32 slots.
    pub segment_bytes: usize,
    /// Maximum number of segments the pool may grow to.
    pub max_segments: u16,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            segment_name: "skein".to_string(),
            segment_bytes: DEFAULT_SEGMENT_BYTES,
            max_segments: 16,
        }
    }
}

impl ArenaConfig {
    /// Validate structural invariants.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.segment_name.is_empty() {
            return Err(ArenaError::InvalidConfig {
                reason: "segment_name must not be empty".to_string(),
            });
        }
        if self.segment_bytes < std::mem::size_of::<f32>() {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "segment_bytes ({}) is smaller than one f32 slot",
                    self.segment_bytes
                ),
            });
        }
        if self.segment_elems() > u32::MAX as usize {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "segment_bytes ({}) exceeds the u32 slot addressing limit",
                    self.segment_bytes
                ),
            });
        }
        if self.max_segments == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "max_segments must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Segment capacity in f32 slots.
    pub fn segment_elems(&self) -> usize {
        self.segment_bytes / std::mem::size_of::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(ArenaConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_name_rejected() {
        let config = ArenaConfig {
            segment_name: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ArenaError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn zero_segments_rejected() {
        let config = ArenaConfig {
            max_segments: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ArenaError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn tiny_segment_rejected() {
        let config = ArenaConfig {
            segment_bytes: 2,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ArenaError::InvalidConfig { .. })
        ));
    }
}
