//! Member selection for cascading factory interception.
//!
//! A factory call's result is instrumented on the members a selector names.
//! The choice may depend on the call's arguments: a `"2d"` drawing context
//! exposes a different surface than a `"webgl"` one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::object_model::HostValue;

/// Chooses which members of a factory result to intercept.
pub trait MemberSelector {
    fn select(&self, args: &[HostValue], result: &HostValue) -> Vec<String>;
}

impl<F> MemberSelector for F
where
    F: Fn(&[HostValue], &HostValue) -> Vec<String>,
{
    fn select(&self, args: &[HostValue], result: &HostValue) -> Vec<String> {
        self(args, result)
    }
}

/// The same members for every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedMembers {
    pub members: Vec<String>,
}

impl FixedMembers {
    pub fn new(members: &[&str]) -> Self {
        Self {
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl MemberSelector for FixedMembers {
    fn select(&self, _args: &[HostValue], _result: &HostValue) -> Vec<String> {
        self.members.clone()
    }
}

/// Members keyed by the call's first argument, when it is a string.
/// Any other first argument, or an unknown key, selects `default`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentKeyed {
    pub cases: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub default: Vec<String>,
}

impl ArgumentKeyed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case(mut self, key: &str, members: &[&str]) -> Self {
        self.cases.insert(
            key.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    pub fn otherwise(mut self, members: &[&str]) -> Self {
        self.default = members.iter().map(|m| m.to_string()).collect();
        self
    }
}

impl MemberSelector for ArgumentKeyed {
    fn select(&self, args: &[HostValue], _result: &HostValue) -> Vec<String> {
        args.first()
            .and_then(HostValue::as_str)
            .and_then(|key| self.cases.get(key))
            .unwrap_or(&self.default)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_selector() -> ArgumentKeyed {
        ArgumentKeyed::new()
            .case("2d", &["fillText", "getImageData"])
            .case("webgl", &["getParameter"])
    }

    #[test]
    fn fixed_ignores_arguments() {
        let selector = FixedMembers::new(&["open", "send"]);
        assert_eq!(
            selector.select(&[HostValue::Int(1)], &HostValue::Null),
            vec!["open", "send"]
        );
    }

    #[test]
    fn argument_keyed_picks_case() {
        let selector = context_selector();
        assert_eq!(
            selector.select(&[HostValue::from("webgl")], &HostValue::Null),
            vec!["getParameter"]
        );
        assert_eq!(
            selector.select(&[HostValue::from("2d")], &HostValue::Null),
            vec!["fillText", "getImageData"]
        );
    }

    #[test]
    fn argument_keyed_falls_back_to_default() {
        let selector = context_selector().otherwise(&["toString"]);
        assert_eq!(
            selector.select(&[HostValue::from("bitmaprenderer")], &HostValue::Null),
            vec!["toString"]
        );
        assert_eq!(selector.select(&[HostValue::Int(2)], &HostValue::Null), vec!["toString"]);
        assert!(context_selector().select(&[], &HostValue::Null).is_empty());
    }

    #[test]
    fn closures_are_selectors() {
        let selector = |args: &[HostValue], _: &HostValue| vec![format!("m{}", args.len())];
        assert_eq!(selector.select(&[HostValue::Null, HostValue::Null], &HostValue::Null), vec!["m2"]);
    }

    #[test]
    fn argument_keyed_serde_roundtrip() {
        let selector = context_selector();
        let json = serde_json::to_string(&selector).expect("serialize");
        let restored: ArgumentKeyed = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(selector, restored);
    }
}
