use std::path::Path;

use serde_json::Value;

use crate::storage::StorageError;

type MigrationFn = fn(Value) -> Result<Value, StorageError>;

/// Index `n` upgrades a document from version `n + 1` to `n + 2`.
fn get_migrations() -> Vec<MigrationFn> {
    vec![]
}

/// Returns 1 if version field is missing (assumes v1, our first versioned schema)
pub fn detect_version(path: &Path, value: &Value) -> Result<u32, StorageError> {
    match value.get("version") {
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| StorageError::InvalidVersion {
                path: path.to_path_buf(),
                found: v.to_string(),
            }),
        None => Ok(1),
    }
}

/// Migrations are applied sequentially: v1→v2→v3→...→target
pub fn apply_migrations(
    mut data: Value,
    from_version: u32,
    to_version: u32,
) -> Result<Value, StorageError> {
    if from_version > to_version {
        return Err(StorageError::FutureVersion(from_version));
    }

    let migrations = get_migrations();

    for version in from_version..to_version {
        let migration = version
            .checked_sub(1)
            .and_then(|idx| migrations.get(idx as usize))
            .ok_or(StorageError::UnsupportedVersion(version))?;

        data = migration(data)?;
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    #[test]
    fn test_detect_version_with_version_field() {
        let value = serde_json::json!({"version": 2, "projects": []});
        assert_eq!(detect_version(&PathBuf::from("p.json"), &value).unwrap(), 2);
    }

    #[test]
    fn test_detect_version_without_version_field() {
        let value = serde_json::json!({"projects": []});
        assert_eq!(detect_version(&PathBuf::from("p.json"), &value).unwrap(), 1);
    }

    #[test]
    fn test_detect_version_rejects_non_numeric() {
        let value = serde_json::json!({"version": "one"});
        let result = detect_version(&PathBuf::from("p.json"), &value);
        assert!(matches!(result, Err(StorageError::InvalidVersion { .. })));
    }

    #[test]
    fn test_apply_migrations_same_version() {
        let data = serde_json::json!({"version": 1});
        let result = apply_migrations(data.clone(), 1, 1).unwrap();
        assert_eq!(result, data);
    }

    #[test]
    fn test_apply_migrations_future_version() {
        let data = serde_json::json!({"version": 5});
        let result = apply_migrations(data, 5, 1);
        assert!(matches!(result, Err(StorageError::FutureVersion(5))));
    }

    #[test]
    fn test_apply_migrations_missing_step() {
        let data = serde_json::json!({"version": 1});
        let result = apply_migrations(data, 1, 2);
        assert!(matches!(result, Err(StorageError::UnsupportedVersion(1))));
    }
}
