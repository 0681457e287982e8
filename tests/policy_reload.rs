// Policy store loading, overriding and hot reload

mod helpers;

use helpers::write_policy;
use kubegate::security::{
    CommandValidator, PolicyDefinition, PolicyStore, SecurityMode, ValidationError,
};
use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const HELM_ONLY_OVERRIDE: &str = r#"
[dangerous_commands]
helm = ["helm list"]
"#;

#[test]
fn test_override_replaces_only_named_tool() {
    let dir = TempDir::new().unwrap();
    let path = write_policy(dir.path(), HELM_ONLY_OVERRIDE);

    let store = PolicyStore::load(PolicyDefinition::builtin(), Some(path));
    let defaults = PolicyStore::with_defaults();

    let snapshot = store.snapshot();
    let helm = snapshot.tool("helm").unwrap();
    assert_eq!(helm.dangerous.len(), 1);
    assert_eq!(helm.dangerous[0].matcher.as_str(), "helm list");

    let default_snapshot = defaults.snapshot();
    let kubectl = snapshot.tool("kubectl").unwrap();
    let default_kubectl = default_snapshot.tool("kubectl").unwrap();
    assert_eq!(kubectl.dangerous.len(), default_kubectl.dangerous.len());
    assert_eq!(kubectl.safe.len(), default_kubectl.safe.len());
    assert_eq!(kubectl.regex.len(), default_kubectl.regex.len());
}

#[test]
fn test_override_changes_validation() {
    let dir = TempDir::new().unwrap();
    let path = write_policy(dir.path(), HELM_ONLY_OVERRIDE);

    let store = Arc::new(PolicyStore::load(PolicyDefinition::builtin(), Some(path)));
    let validator = CommandValidator::new(store, SecurityMode::Strict);

    assert!(matches!(
        validator.validate("helm", "helm list -A"),
        Err(ValidationError::DangerousCommand { .. })
    ));
    // Replaced, not merged: the default helm prefixes are gone
    assert!(validator.validate("helm", "helm uninstall web").is_ok());
    // Other tools keep their defaults
    assert!(validator.validate("kubectl", "kubectl delete pods --all").is_err());
}

#[test]
fn test_regex_rules_from_override() {
    let dir = TempDir::new().unwrap();
    let path = write_policy(
        dir.path(),
        r#"
[[regex_rules.istioctl]]
pattern = 'istioctl\s+proxy-config\s+secret'
description = "Dumping proxy secrets is not allowed"
"#,
    );

    let store = Arc::new(PolicyStore::load(PolicyDefinition::builtin(), Some(path)));
    let validator = CommandValidator::new(store, SecurityMode::Strict);

    let result = validator.validate("istioctl", "istioctl proxy-config secret web-1");
    assert_eq!(
        result.unwrap_err().to_string(),
        "Dumping proxy secrets is not allowed"
    );
}

#[test]
fn test_malformed_override_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_policy(dir.path(), "[dangerous_commands\nhelm = 3");

    let store = PolicyStore::load(PolicyDefinition::builtin(), Some(path));
    let snapshot = store.snapshot();

    assert!(!snapshot.warnings().is_empty());
    let defaults = PolicyStore::with_defaults();
    assert_eq!(
        snapshot.tool("helm").unwrap().dangerous.len(),
        defaults.snapshot().tool("helm").unwrap().dangerous.len()
    );
}

#[test]
fn test_missing_override_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let store = PolicyStore::load(
        PolicyDefinition::builtin(),
        Some(dir.path().join("absent.toml")),
    );
    assert!(store.snapshot().warnings().is_empty());
    assert!(store.snapshot().tool("kubectl").is_some());
}

#[test]
fn test_reload_picks_up_changes() {
    let dir = TempDir::new().unwrap();
    let path = write_policy(dir.path(), HELM_ONLY_OVERRIDE);
    let store = PolicyStore::load(PolicyDefinition::builtin(), Some(path.clone()));

    let before = store.snapshot();
    assert_eq!(before.version(), 1);

    fs::write(&path, "[dangerous_commands]\nhelm = [\"helm list\", \"helm status\"]\n").unwrap();
    let after = store.reload();

    assert_eq!(after.version(), 2);
    assert_eq!(after.tool("helm").unwrap().dangerous.len(), 2);
    // Snapshots already handed out never change
    assert_eq!(before.tool("helm").unwrap().dangerous.len(), 1);
}

#[test]
fn test_reload_with_broken_file_keeps_serving_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_policy(dir.path(), HELM_ONLY_OVERRIDE);
    let store = PolicyStore::load(PolicyDefinition::builtin(), Some(path.clone()));

    fs::write(&path, "not = [valid").unwrap();
    let snapshot = store.reload();

    assert!(!snapshot.warnings().is_empty());
    assert!(snapshot.tool("helm").unwrap().dangerous.len() > 1);
}

#[test]
fn test_readers_see_complete_snapshots_during_reload() {
    let dir = TempDir::new().unwrap();
    let path = write_policy(dir.path(), HELM_ONLY_OVERRIDE);
    let store = Arc::new(PolicyStore::load(PolicyDefinition::builtin(), Some(path)));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..200 {
                    let snapshot = store.snapshot();
                    assert_eq!(snapshot.tool("helm").unwrap().dangerous.len(), 1);
                    assert!(snapshot.tool("kubectl").is_some());
                }
            })
        })
        .collect();

    for _ in 0..20 {
        store.reload();
    }

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(store.snapshot().version(), 21);
}
