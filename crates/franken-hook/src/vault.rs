//! Original-value vault.
//!
//! Holds the pristine value or callable captured for each interception
//! point. Exactly one entry per key; capturing twice is an error so that a
//! member is never wrapped over its own wrapper.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::HookError;
use crate::object_model::{FunctionId, HostValue, ObjectHandle};

/// JSON maps need string keys, so entries travel as `[key, entry]` pairs.
mod entries_as_seq {
    use super::{BTreeMap, InterceptionKey, VaultEntry};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<InterceptionKey, VaultEntry>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let pairs: Vec<(&InterceptionKey, &VaultEntry)> = map.iter().collect();
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<InterceptionKey, VaultEntry>, D::Error> {
        let pairs: Vec<(InterceptionKey, VaultEntry)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

/// Identifies one interception point.
///
/// Identity is `(owner, member)`. `label` is the name reported as the
/// record's target and takes no part in equality, ordering or hashing, so a
/// member captured under one label cannot be captured again under another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterceptionKey {
    pub owner: ObjectHandle,
    pub label: String,
    pub member: String,
}

impl InterceptionKey {
    pub fn new(owner: ObjectHandle, label: &str, member: &str) -> Self {
        Self {
            owner,
            label: label.to_string(),
            member: member.to_string(),
        }
    }
}

impl PartialEq for InterceptionKey {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.member == other.member
    }
}

impl Eq for InterceptionKey {}

impl PartialOrd for InterceptionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InterceptionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.owner, &self.member).cmp(&(other.owner, &other.member))
    }
}

impl Hash for InterceptionKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        self.member.hash(state);
    }
}

impl fmt::Display for InterceptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}.{}", self.label, self.owner.0, self.member)
    }
}

/// What was captured at install time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultEntry {
    OriginalValue(HostValue),
    OriginalCallable(FunctionId),
}

impl VaultEntry {
    /// The entry as a host value.
    pub fn to_value(&self) -> HostValue {
        match self {
            Self::OriginalValue(value) => value.clone(),
            Self::OriginalCallable(id) => HostValue::Function(*id),
        }
    }
}

/// Mapping from interception point to captured original.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalVault {
    #[serde(with = "entries_as_seq")]
    entries: BTreeMap<InterceptionKey, VaultEntry>,
}

impl OriginalVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `entry` under `key` if, and only if, nothing is stored yet.
    pub fn capture(&mut self, key: InterceptionKey, entry: VaultEntry) -> Result<(), HookError> {
        if self.entries.contains_key(&key) {
            return Err(HookError::AlreadyCaptured { key });
        }
        self.entries.insert(key, entry);
        Ok(())
    }

    pub fn read(&self, key: &InterceptionKey) -> Result<&VaultEntry, HookError> {
        self.entries
            .get(key)
            .ok_or_else(|| HookError::NotCaptured { key: key.clone() })
    }

    /// The captured callable of a method interception point.
    pub fn read_callable(&self, key: &InterceptionKey) -> Result<FunctionId, HookError> {
        match self.read(key)? {
            VaultEntry::OriginalCallable(id) => Ok(*id),
            VaultEntry::OriginalValue(value) => Err(HookError::NotCallable {
                key: key.clone(),
                found: value.type_name().to_string(),
            }),
        }
    }

    /// Overwrite the stored value in place (property set path).
    pub fn write(&mut self, key: &InterceptionKey, value: HostValue) -> Result<(), HookError> {
        let slot = self
            .entries
            .get_mut(key)
            .ok_or_else(|| HookError::NotCaptured { key: key.clone() })?;
        *slot = VaultEntry::OriginalValue(value);
        Ok(())
    }

    pub fn contains(&self, key: &InterceptionKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &InterceptionKey> {
        self.entries.keys()
    }

    /// Keys captured for one owner.
    pub fn keys_for(&self, owner: ObjectHandle) -> Vec<&InterceptionKey> {
        self.entries.keys().filter(|key| key.owner == owner).collect()
    }

    /// Undo a capture whose accessor could not be installed.
    pub(crate) fn rollback(&mut self, key: &InterceptionKey) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(member: &str) -> InterceptionKey {
        InterceptionKey::new(ObjectHandle(1), "Navigator", member)
    }

    #[test]
    fn capture_then_read() {
        let mut vault = OriginalVault::new();
        vault
            .capture(key("userAgent"), VaultEntry::OriginalValue(HostValue::from("ua")))
            .unwrap();
        assert_eq!(
            vault.read(&key("userAgent")).unwrap(),
            &VaultEntry::OriginalValue(HostValue::from("ua"))
        );
        assert_eq!(vault.len(), 1);
    }

    #[test]
    fn second_capture_fails_and_keeps_entry() {
        let mut vault = OriginalVault::new();
        vault
            .capture(key("language"), VaultEntry::OriginalValue(HostValue::from("en")))
            .unwrap();
        let err = vault
            .capture(key("language"), VaultEntry::OriginalValue(HostValue::from("fr")))
            .unwrap_err();
        assert!(matches!(err, HookError::AlreadyCaptured { .. }));
        assert_eq!(
            vault.read(&key("language")).unwrap().to_value(),
            HostValue::from("en")
        );
    }

    #[test]
    fn read_and_write_missing_key_fail() {
        let mut vault = OriginalVault::new();
        assert!(matches!(
            vault.read(&key("platform")).unwrap_err(),
            HookError::NotCaptured { .. }
        ));
        assert!(matches!(
            vault.write(&key("platform"), HostValue::Null).unwrap_err(),
            HookError::NotCaptured { .. }
        ));
        assert!(vault.is_empty());
    }

    #[test]
    fn write_updates_in_place() {
        let mut vault = OriginalVault::new();
        vault
            .capture(key("onLine"), VaultEntry::OriginalValue(HostValue::Bool(true)))
            .unwrap();
        vault.write(&key("onLine"), HostValue::Bool(false)).unwrap();
        assert_eq!(vault.read(&key("onLine")).unwrap().to_value(), HostValue::Bool(false));
        assert_eq!(vault.len(), 1);
    }

    #[test]
    fn same_member_on_distinct_owners_is_distinct() {
        let mut vault = OriginalVault::new();
        let a = InterceptionKey::new(ObjectHandle(10), "XMLHttpRequest", "open");
        let b = InterceptionKey::new(ObjectHandle(11), "XMLHttpRequest", "open");
        vault.capture(a, VaultEntry::OriginalCallable(FunctionId(1))).unwrap();
        vault.capture(b, VaultEntry::OriginalCallable(FunctionId(2))).unwrap();
        assert_eq!(vault.keys_for(ObjectHandle(10)).len(), 1);
        assert_eq!(vault.len(), 2);
    }

    #[test]
    fn relabeled_key_names_the_same_capture() {
        let mut vault = OriginalVault::new();
        let plain = InterceptionKey::new(ObjectHandle(4), "Window", "fetch");
        let relabeled = InterceptionKey::new(ObjectHandle(4), "window", "fetch");
        vault
            .capture(plain, VaultEntry::OriginalCallable(FunctionId(9)))
            .unwrap();

        let err = vault
            .capture(relabeled.clone(), VaultEntry::OriginalCallable(FunctionId(10)))
            .unwrap_err();
        assert!(matches!(err, HookError::AlreadyCaptured { .. }));
        assert_eq!(vault.len(), 1);
        assert_eq!(vault.read_callable(&relabeled).unwrap(), FunctionId(9));
        assert_eq!(vault.keys().next().unwrap().label, "Window");
    }

    #[test]
    fn read_callable_rejects_value_entries() {
        let mut vault = OriginalVault::new();
        vault
            .capture(key("vendor"), VaultEntry::OriginalValue(HostValue::from("x")))
            .unwrap();
        assert!(matches!(
            vault.read_callable(&key("vendor")).unwrap_err(),
            HookError::NotCallable { .. }
        ));
    }

    #[test]
    fn vault_serde_roundtrip() {
        let mut vault = OriginalVault::new();
        vault
            .capture(key("appName"), VaultEntry::OriginalValue(HostValue::from("Netscape")))
            .unwrap();
        let json = serde_json::to_string(&vault).expect("serialize");
        let restored: OriginalVault = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(vault, restored);
    }
}
