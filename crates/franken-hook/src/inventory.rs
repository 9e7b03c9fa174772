//! Bootstrap inventory: which members of which host objects to intercept.
//!
//! The inventory is plain data. Owners are named symbolically (`"window"`,
//! `"document"`) and resolved through [`OwnerBindings`] when applied, so the
//! same inventory can be loaded from JSON and applied to any realm that
//! binds those names.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{HookError, InventoryError};
use crate::interceptor::{CascadeScope, InstallOutcome, InterceptionKind, InterceptionPoint, Interceptor};
use crate::object_model::{ObjectHandle, Realm};
use crate::selector::{ArgumentKeyed, FixedMembers, MemberSelector};
use crate::vault::InterceptionKey;

/// Members of one owner, each hooked as a method when it is an own callable
/// and as a property otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryGroup {
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub members: Vec<String>,
}

impl InventoryGroup {
    pub fn new(owner: &str, members: &[&str]) -> Self {
        Self {
            owner: owner.to_string(),
            label: None,
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Declarative form of a [`MemberSelector`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectorSpec {
    Fixed {
        members: Vec<String>,
    },
    ByFirstArgument {
        cases: BTreeMap<String, Vec<String>>,
        #[serde(default)]
        default: Vec<String>,
    },
}

impl SelectorSpec {
    pub fn to_selector(&self) -> Rc<dyn MemberSelector> {
        match self {
            Self::Fixed { members } => Rc::new(FixedMembers {
                members: members.clone(),
            }),
            Self::ByFirstArgument { cases, default } => Rc::new(ArgumentKeyed {
                cases: cases.clone(),
                default: default.clone(),
            }),
        }
    }
}

/// A factory member whose results get their own interception points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorySpec {
    pub owner: String,
    pub member: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub selector: SelectorSpec,
    #[serde(default)]
    pub scope: CascadeScope,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookInventory {
    #[serde(default)]
    pub groups: Vec<InventoryGroup>,
    #[serde(default)]
    pub factories: Vec<FactorySpec>,
}

impl HookInventory {
    pub fn from_json_str(json: &str) -> Result<Self, InventoryError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Total interception points named, factories included.
    pub fn point_count(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum::<usize>() + self.factories.len()
    }

    /// The page inventory: global storage and network entry points, the
    /// document's properties and query methods, location, navigator,
    /// history navigation, screen metrics, plus the request constructor and
    /// the canvas context accessor as factories.
    pub fn page_default() -> Self {
        let groups = vec![
            InventoryGroup::new(
                "window",
                &[
                    "localStorage",
                    "sessionStorage",
                    "indexedDB",
                    "WebSocket",
                    "postMessage",
                    "fetch",
                ],
            ),
            InventoryGroup::new(
                "document",
                &[
                    "cookie",
                    "domain",
                    "location",
                    "referrer",
                    "title",
                    "URL",
                    "documentElement",
                    "body",
                    "head",
                    "images",
                    "links",
                    "forms",
                    "scripts",
                ],
            ),
            InventoryGroup::new(
                "location",
                &[
                    "href", "protocol", "host", "hostname", "port", "pathname", "search", "hash",
                    "origin",
                ],
            ),
            InventoryGroup::new(
                "navigator",
                &[
                    "userAgent",
                    "language",
                    "languages",
                    "platform",
                    "vendor",
                    "appName",
                    "appVersion",
                    "product",
                    "productSub",
                    "onLine",
                    "hardwareConcurrency",
                    "maxTouchPoints",
                ],
            ),
            InventoryGroup::new(
                "history",
                &["pushState", "replaceState", "go", "back", "forward"],
            ),
            InventoryGroup::new(
                "screen",
                &[
                    "width",
                    "height",
                    "availWidth",
                    "availHeight",
                    "colorDepth",
                    "pixelDepth",
                ],
            ),
            InventoryGroup::new(
                "document",
                &[
                    "getElementById",
                    "getElementsByClassName",
                    "getElementsByName",
                    "getElementsByTagName",
                    "querySelector",
                    "querySelectorAll",
                    "createElement",
                    "createElementNS",
                    "createTextNode",
                ],
            ),
        ];

        let webgl: Vec<String> = ["getParameter", "getExtension", "getSupportedExtensions"]
            .iter()
            .map(|m| m.to_string())
            .collect();
        let mut context_cases = BTreeMap::new();
        context_cases.insert(
            "2d".to_string(),
            ["fillText", "strokeText", "measureText", "getImageData"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
        );
        context_cases.insert("webgl".to_string(), webgl.clone());
        context_cases.insert("webgl2".to_string(), webgl);

        let factories = vec![
            FactorySpec {
                owner: "window".to_string(),
                member: "XMLHttpRequest".to_string(),
                label: None,
                selector: SelectorSpec::Fixed {
                    members: vec![
                        "open".to_string(),
                        "send".to_string(),
                        "setRequestHeader".to_string(),
                    ],
                },
                scope: CascadeScope::ShadowInherited,
            },
            FactorySpec {
                owner: "canvas".to_string(),
                member: "getContext".to_string(),
                label: None,
                selector: SelectorSpec::ByFirstArgument {
                    cases: context_cases,
                    default: Vec::new(),
                },
                scope: CascadeScope::OwnOnly,
            },
        ];

        Self { groups, factories }
    }
}

/// Symbolic owner names resolved to realm handles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerBindings {
    owners: BTreeMap<String, ObjectHandle>,
}

impl OwnerBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: &str, owner: ObjectHandle) -> Self {
        self.insert(name, owner);
        self
    }

    pub fn insert(&mut self, name: &str, owner: ObjectHandle) {
        self.owners.insert(name.to_string(), owner);
    }

    pub fn resolve(&self, name: &str) -> Result<ObjectHandle, InventoryError> {
        self.owners
            .get(name)
            .copied()
            .ok_or_else(|| InventoryError::UnboundOwner {
                owner: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// One inventory entry that could not be installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapFailure {
    pub owner: String,
    pub member: String,
    pub error_code: String,
    pub detail: String,
}

impl BootstrapFailure {
    fn hook(owner: &str, member: &str, error: &HookError) -> Self {
        Self {
            owner: owner.to_string(),
            member: member.to_string(),
            error_code: error.stable_code().to_string(),
            detail: error.to_string(),
        }
    }

    fn inventory(owner: &str, member: &str, error: &InventoryError) -> Self {
        Self {
            owner: owner.to_string(),
            member: member.to_string(),
            error_code: error.stable_code().to_string(),
            detail: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapReport {
    pub installed: Vec<InterceptionKey>,
    pub skipped: Vec<InterceptionKey>,
    pub failed: Vec<BootstrapFailure>,
}

impl BootstrapReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.installed.len() + self.skipped.len() + self.failed.len()
    }

    fn absorb(&mut self, owner: &str, member: &str, result: Result<InstallOutcome, HookError>) {
        match result {
            Ok(InstallOutcome::Installed(key)) => self.installed.push(key),
            Ok(InstallOutcome::Skipped { key, .. }) => self.skipped.push(key),
            Err(error) => self.failed.push(BootstrapFailure::hook(owner, member, &error)),
        }
    }
}

/// Install every entry of `inventory`. A failing entry is reported and the
/// rest are still installed.
pub fn apply_inventory(
    realm: &mut Realm,
    interceptor: &Interceptor,
    inventory: &HookInventory,
    bindings: &OwnerBindings,
) -> BootstrapReport {
    let mut report = BootstrapReport::default();

    for group in &inventory.groups {
        let owner = match bindings.resolve(&group.owner) {
            Ok(owner) => owner,
            Err(error) => {
                for member in &group.members {
                    report
                        .failed
                        .push(BootstrapFailure::inventory(&group.owner, member, &error));
                }
                continue;
            }
        };
        for member in &group.members {
            let result = interceptor.hook_labeled(realm, owner, member, group.label.as_deref());
            report.absorb(&group.owner, member, result);
        }
    }

    for factory in &inventory.factories {
        let owner = match bindings.resolve(&factory.owner) {
            Ok(owner) => owner,
            Err(error) => {
                report.failed.push(BootstrapFailure::inventory(
                    &factory.owner,
                    &factory.member,
                    &error,
                ));
                continue;
            }
        };
        let mut point = InterceptionPoint::new(
            owner,
            &factory.member,
            InterceptionKind::Factory {
                selector: factory.selector.to_selector(),
                scope: factory.scope,
            },
        );
        point.label = factory.label.clone();
        let result = interceptor.install(realm, &point);
        report.absorb(&factory.owner, &factory.member, result);
    }

    tracing::info!(
        target: "franken_hook::bootstrap",
        installed = report.installed.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "inventory applied"
    );
    report
}
