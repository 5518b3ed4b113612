//! Metadata requirement checks.

use crate::map::ValidatorMap;
use serdes_guard_core::{ConfigError, Metadata};

/// Fail if any validator's required metadata key is absent.
///
/// The error names every missing key, not just the first.
pub fn verify_metadata_requirements(
    map: &ValidatorMap,
    metadata: &Metadata,
) -> Result<(), ConfigError> {
    let missing: Vec<String> = map
        .required_metadata_keys()
        .into_iter()
        .filter(|key| !metadata.contains_key(key))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::MissingMetadata { keys: missing })
    }
}
