//! Property, method, and cascading factory interception.
//!
//! Installing an interception point captures the member's original into the
//! vault and replaces the member in place:
//!
//! - **Property**: an accessor pair. Get records `get` and returns the vault
//!   value; set records `set` with the incoming value and writes the vault.
//! - **Method**: a wrapper with the original's name and arity. It records
//!   `call` with the arguments, then invokes the vaulted original with the
//!   same receiver and arguments and returns its result or error verbatim.
//! - **Factory**: a method wrapper that, after a successful original call,
//!   intercepts the members a [`MemberSelector`] names on the returned object.
//!   Each product gets its own vault entries, keyed by its own handle.
//!
//! Only direct (own) members are intercepted; a member that exists solely on
//! a prototype is skipped and nothing is captured. This leaves shared
//! prototype methods unobserved, which is a known coverage gap.
//! [`CascadeScope::ShadowInherited`] opts a factory's products out of it.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{HookError, SerializationError};
use crate::log_event::{HookLogEvent, push_bounded};
use crate::object_model::{
    FunctionId, HostError, HostValue, Invocation, NativeFn, ObjectHandle, PropertyDescriptor,
    Realm,
};
use crate::recorder::{EventRecorder, OpKind, PayloadRender};
use crate::selector::MemberSelector;
use crate::vault::{InterceptionKey, OriginalVault, VaultEntry};

const COMPONENT: &str = "interceptor";

// ---------------------------------------------------------------------------
// Interception points
// ---------------------------------------------------------------------------

/// Whether a factory cascade may wrap members its product only inherits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeScope {
    /// Only members found directly on the product.
    #[default]
    OwnOnly,
    /// Inherited callables are wrapped by an own member on the product;
    /// the prototype itself is never modified.
    ShadowInherited,
}

/// How an interception point is observed.
#[derive(Clone)]
pub enum InterceptionKind {
    Property,
    Method,
    Factory {
        selector: Rc<dyn MemberSelector>,
        scope: CascadeScope,
    },
}

impl fmt::Debug for InterceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property => f.write_str("Property"),
            Self::Method => f.write_str("Method"),
            Self::Factory { scope, .. } => f.debug_struct("Factory").field("scope", scope).finish(),
        }
    }
}

/// One `(owner, member)` pair to intercept.
#[derive(Debug, Clone)]
pub struct InterceptionPoint {
    pub owner: ObjectHandle,
    pub member: String,
    /// Overrides the constructor-derived target label.
    pub label: Option<String>,
    pub kind: InterceptionKind,
}

impl InterceptionPoint {
    pub fn new(owner: ObjectHandle, member: &str, kind: InterceptionKind) -> Self {
        Self {
            owner,
            member: member.to_string(),
            label: None,
            kind,
        }
    }

    pub fn labeled(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }
}

/// Why an install was a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The member resolves only through the prototype chain.
    Inherited,
    /// The member does not resolve at all.
    Absent,
}

/// Result of a successful install call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallOutcome {
    Installed(InterceptionKey),
    Skipped {
        key: InterceptionKey,
        reason: SkipReason,
    },
}

impl InstallOutcome {
    pub fn key(&self) -> &InterceptionKey {
        match self {
            Self::Installed(key) | Self::Skipped { key, .. } => key,
        }
    }

    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed(_))
    }
}

// ---------------------------------------------------------------------------
// Payloads drawn from the realm
// ---------------------------------------------------------------------------

enum PayloadValues<'a> {
    One(&'a HostValue),
    List(&'a [HostValue]),
}

/// Host values rendered through [`Realm::snapshot`].
pub struct HostPayload<'a> {
    realm: &'a Realm,
    values: PayloadValues<'a>,
}

impl<'a> HostPayload<'a> {
    pub fn value(realm: &'a Realm, value: &'a HostValue) -> Self {
        Self {
            realm,
            values: PayloadValues::One(value),
        }
    }

    pub fn arguments(realm: &'a Realm, args: &'a [HostValue]) -> Self {
        Self {
            realm,
            values: PayloadValues::List(args),
        }
    }
}

impl PayloadRender for HostPayload<'_> {
    fn render(&self) -> Result<String, SerializationError> {
        let json = match self.values {
            PayloadValues::One(value) => self.realm.snapshot(value)?,
            PayloadValues::List(args) => self.realm.snapshot_all(args)?,
        };
        Ok(serde_json::to_string(&json)?)
    }
}

// ---------------------------------------------------------------------------
// Interceptor
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Cascade {
    selector: Rc<dyn MemberSelector>,
    scope: CascadeScope,
}

struct Shared {
    vault: RefCell<OriginalVault>,
    recorder: RefCell<EventRecorder>,
    log_events: RefCell<VecDeque<HookLogEvent>>,
    trace_id: String,
}

/// Installs interception points and owns the vault and recorder they share.
///
/// Cloning is cheap; clones share all state. Wrappers installed into a realm
/// hold a clone, so the vault lives as long as any wrapper does.
#[derive(Clone)]
pub struct Interceptor {
    shared: Rc<Shared>,
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("trace_id", &self.shared.trace_id)
            .field("captured", &self.shared.vault.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Interceptor {
    pub fn new(recorder: EventRecorder) -> Self {
        let trace_id = recorder.trace_id().to_string();
        Self {
            shared: Rc::new(Shared {
                vault: RefCell::new(OriginalVault::new()),
                recorder: RefCell::new(recorder),
                log_events: RefCell::new(VecDeque::new()),
                trace_id,
            }),
        }
    }

    pub fn vault(&self) -> Ref<'_, OriginalVault> {
        self.shared.vault.borrow()
    }

    pub fn recorder(&self) -> Ref<'_, EventRecorder> {
        self.shared.recorder.borrow()
    }

    pub fn recorder_mut(&self) -> RefMut<'_, EventRecorder> {
        self.shared.recorder.borrow_mut()
    }

    /// Install and cascade diagnostics, oldest first. At most
    /// [`MAX_LOG_EVENTS`](crate::log_event::MAX_LOG_EVENTS) are kept.
    pub fn log_events(&self) -> Vec<HookLogEvent> {
        self.shared.log_events.borrow().iter().cloned().collect()
    }

    /// Whether `owner.member` is captured, under whatever label.
    pub fn is_intercepted(&self, owner: ObjectHandle, member: &str) -> bool {
        self.vault()
            .keys_for(owner)
            .iter()
            .any(|key| key.member == member)
    }

    // -- Install entry points ----------------------------------------------

    pub fn install(
        &self,
        realm: &mut Realm,
        point: &InterceptionPoint,
    ) -> Result<InstallOutcome, HookError> {
        let label = match &point.label {
            Some(label) => label.clone(),
            None => realm.owner_label(point.owner)?,
        };
        let key = InterceptionKey::new(point.owner, &label, &point.member);
        let result = match &point.kind {
            InterceptionKind::Property => self.install_accessor(realm, key),
            InterceptionKind::Method => self.install_callable(realm, key, None),
            InterceptionKind::Factory { selector, scope } => {
                let cascade = Cascade {
                    selector: Rc::clone(selector),
                    scope: *scope,
                };
                self.install_callable(realm, key, Some(cascade))
            }
        };
        self.log_install(&point.kind, &point.owner, &point.member, &result);
        result
    }

    /// Intercept reads and writes of `owner.member`.
    pub fn install_property(
        &self,
        realm: &mut Realm,
        owner: ObjectHandle,
        member: &str,
    ) -> Result<InstallOutcome, HookError> {
        self.install(
            realm,
            &InterceptionPoint::new(owner, member, InterceptionKind::Property),
        )
    }

    /// Intercept calls of `owner.member`.
    pub fn install_method(
        &self,
        realm: &mut Realm,
        owner: ObjectHandle,
        member: &str,
    ) -> Result<InstallOutcome, HookError> {
        self.install(
            realm,
            &InterceptionPoint::new(owner, member, InterceptionKind::Method),
        )
    }

    /// Intercept calls of `owner.member` and the selected members of every
    /// object it returns.
    pub fn install_factory(
        &self,
        realm: &mut Realm,
        owner: ObjectHandle,
        member: &str,
        selector: Rc<dyn MemberSelector>,
        scope: CascadeScope,
    ) -> Result<InstallOutcome, HookError> {
        self.install(
            realm,
            &InterceptionPoint::new(owner, member, InterceptionKind::Factory { selector, scope }),
        )
    }

    /// Intercept `owner.member` as a method if it is an own callable data
    /// member, as a property otherwise.
    pub fn hook(
        &self,
        realm: &mut Realm,
        owner: ObjectHandle,
        member: &str,
    ) -> Result<InstallOutcome, HookError> {
        self.hook_labeled(realm, owner, member, None)
    }

    /// [`Interceptor::hook`] with an explicit target label.
    pub fn hook_labeled(
        &self,
        realm: &mut Realm,
        owner: ObjectHandle,
        member: &str,
        label: Option<&str>,
    ) -> Result<InstallOutcome, HookError> {
        let callable = matches!(
            realm.get_own_property(owner, member)?,
            Some(PropertyDescriptor::Data {
                value: HostValue::Function(_),
                ..
            })
        );
        let kind = if callable {
            InterceptionKind::Method
        } else {
            InterceptionKind::Property
        };
        let mut point = InterceptionPoint::new(owner, member, kind);
        point.label = label.map(str::to_string);
        self.install(realm, &point)
    }

    // -- Property interception ---------------------------------------------

    fn install_accessor(
        &self,
        realm: &mut Realm,
        key: InterceptionKey,
    ) -> Result<InstallOutcome, HookError> {
        let Some(current) = realm.get_own_property(key.owner, &key.member)?.cloned() else {
            return self.skipped(realm, key);
        };
        if self.vault().contains(&key) {
            return Err(HookError::AlreadyCaptured { key });
        }
        if !current.is_configurable() {
            return Err(HookError::NotConfigurable { key });
        }

        let value = realm.get(key.owner, &key.member)?;
        self.shared
            .vault
            .borrow_mut()
            .capture(key.clone(), VaultEntry::OriginalValue(value))?;

        let getter = realm.register_function(
            &format!("get {}", key.member),
            0,
            self.getter_behavior(key.clone()),
        );
        let setter = realm.register_function(
            &format!("set {}", key.member),
            1,
            self.setter_behavior(key.clone()),
        );
        let accessor = PropertyDescriptor::Accessor {
            get: Some(getter),
            set: Some(setter),
            enumerable: current.is_enumerable(),
            configurable: true,
        };
        self.replace_member(realm, key, accessor)
    }

    fn getter_behavior(&self, key: InterceptionKey) -> NativeFn {
        let interceptor = self.clone();
        Rc::new(move |_realm: &mut Realm, _inv: Invocation| {
            interceptor.observe(OpKind::Get, &key, None);
            interceptor
                .vault()
                .read(&key)
                .map(VaultEntry::to_value)
                .map_err(instrumentation_fault)
        })
    }

    fn setter_behavior(&self, key: InterceptionKey) -> NativeFn {
        let interceptor = self.clone();
        Rc::new(move |realm: &mut Realm, inv: Invocation| {
            let value = inv.arg(0);
            interceptor.observe(OpKind::Set, &key, Some(&HostPayload::value(realm, &value)));
            interceptor
                .shared
                .vault
                .borrow_mut()
                .write(&key, value)
                .map_err(instrumentation_fault)?;
            Ok(HostValue::Undefined)
        })
    }

    // -- Method / factory interception -------------------------------------

    fn install_callable(
        &self,
        realm: &mut Realm,
        key: InterceptionKey,
        cascade: Option<Cascade>,
    ) -> Result<InstallOutcome, HookError> {
        let Some(current) = realm.get_own_property(key.owner, &key.member)?.cloned() else {
            return self.skipped(realm, key);
        };
        if self.vault().contains(&key) {
            return Err(HookError::AlreadyCaptured { key });
        }
        let original = callable_of(&key, &current)?;
        if !current.is_configurable() {
            return Err(HookError::NotConfigurable { key });
        }
        self.wrap(realm, key, original, &current, cascade)
    }

    /// Shadow an inherited callable on the product itself.
    fn install_shadow(
        &self,
        realm: &mut Realm,
        key: InterceptionKey,
    ) -> Result<InstallOutcome, HookError> {
        if realm.has_own_property(key.owner, &key.member)? {
            return self.install_callable(realm, key, None);
        }
        let Some((_, inherited)) = realm.lookup(key.owner, &key.member)? else {
            return self.skipped(realm, key);
        };
        if self.vault().contains(&key) {
            return Err(HookError::AlreadyCaptured { key });
        }
        let original = callable_of(&key, &inherited)?;
        self.wrap(
            realm,
            key,
            original,
            &PropertyDescriptor::data(HostValue::Function(original)),
            None,
        )
    }

    fn wrap(
        &self,
        realm: &mut Realm,
        key: InterceptionKey,
        original: FunctionId,
        current: &PropertyDescriptor,
        cascade: Option<Cascade>,
    ) -> Result<InstallOutcome, HookError> {
        let (name, arity) = {
            let function = realm.function(original)?;
            (function.name.clone(), function.arity)
        };
        self.shared
            .vault
            .borrow_mut()
            .capture(key.clone(), VaultEntry::OriginalCallable(original))?;

        let behavior = self.wrapper_behavior(key.clone(), cascade);
        let wrapper = realm.register_function(&name, arity, behavior);
        let replacement = PropertyDescriptor::Data {
            value: HostValue::Function(wrapper),
            writable: current.is_writable(),
            enumerable: current.is_enumerable(),
            configurable: current.is_configurable(),
        };
        self.replace_member(realm, key, replacement)
    }

    fn wrapper_behavior(&self, key: InterceptionKey, cascade: Option<Cascade>) -> NativeFn {
        let interceptor = self.clone();
        Rc::new(move |realm: &mut Realm, inv: Invocation| {
            interceptor.observe(
                OpKind::Call,
                &key,
                Some(&HostPayload::arguments(realm, &inv.args)),
            );
            let original = interceptor
                .vault()
                .read_callable(&key)
                .map_err(instrumentation_fault)?;
            let Some(cascade) = &cascade else {
                return realm.call(original, inv.receiver, inv.args);
            };
            let args = inv.args.clone();
            let result = realm.call(original, inv.receiver, inv.args)?;
            interceptor.instrument_product(realm, &key, &args, &result, cascade);
            Ok(result)
        })
    }

    /// Intercept the selected members of a factory's result. Failures are
    /// contained: the factory call has already succeeded and must stay so.
    fn instrument_product(
        &self,
        realm: &mut Realm,
        factory: &InterceptionKey,
        args: &[HostValue],
        result: &HostValue,
        cascade: &Cascade,
    ) {
        let Some(product) = result.as_object() else {
            return;
        };
        let label = match realm.owner_label(product) {
            Ok(label) => label,
            Err(error) => {
                let error = HookError::from(error);
                self.push_log(
                    "cascade",
                    "skipped",
                    Some(error.stable_code()),
                    format!("{factory}: {error}"),
                );
                return;
            }
        };
        for member in cascade.selector.select(args, result) {
            let key = InterceptionKey::new(product, &label, &member);
            let outcome = match cascade.scope {
                CascadeScope::OwnOnly => self.install_callable(realm, key.clone(), None),
                CascadeScope::ShadowInherited => self.install_shadow(realm, key.clone()),
            };
            match outcome {
                Ok(InstallOutcome::Installed(_)) => {
                    self.push_log("cascade", "installed", None, format!("{factory} -> {key}"));
                }
                Ok(InstallOutcome::Skipped { reason, .. }) => {
                    let outcome = match reason {
                        SkipReason::Inherited => "skipped_inherited",
                        SkipReason::Absent => "skipped_absent",
                    };
                    self.push_log("cascade", outcome, None, format!("{factory} -> {key}"));
                }
                Err(error) => {
                    self.push_log(
                        "cascade",
                        "skipped",
                        Some(error.stable_code()),
                        format!("{factory} -> {error}"),
                    );
                }
            }
        }
    }

    // -- Shared helpers ----------------------------------------------------

    /// Record one observation. An observation raised while the recorder is
    /// busy (a sink or breakpoint handler re-entering the realm) is dropped.
    fn observe(&self, op: OpKind, key: &InterceptionKey, payload: Option<&dyn PayloadRender>) {
        match self.shared.recorder.try_borrow_mut() {
            Ok(mut recorder) => {
                recorder.record(op, &key.label, &key.member, payload);
            }
            Err(_) => self.push_log("observe", "dropped_reentrant", None, key.to_string()),
        }
    }

    fn replace_member(
        &self,
        realm: &mut Realm,
        key: InterceptionKey,
        desc: PropertyDescriptor,
    ) -> Result<InstallOutcome, HookError> {
        match realm.define_property(key.owner, &key.member, desc) {
            Ok(true) => Ok(InstallOutcome::Installed(key)),
            Ok(false) => {
                self.shared.vault.borrow_mut().rollback(&key);
                Err(HookError::NotConfigurable { key })
            }
            Err(error) => {
                self.shared.vault.borrow_mut().rollback(&key);
                Err(HookError::Host(error))
            }
        }
    }

    fn skipped(&self, realm: &Realm, key: InterceptionKey) -> Result<InstallOutcome, HookError> {
        let reason = if realm.lookup(key.owner, &key.member)?.is_some() {
            SkipReason::Inherited
        } else {
            SkipReason::Absent
        };
        Ok(InstallOutcome::Skipped { key, reason })
    }

    fn log_install(
        &self,
        kind: &InterceptionKind,
        owner: &ObjectHandle,
        member: &str,
        result: &Result<InstallOutcome, HookError>,
    ) {
        let event = match kind {
            InterceptionKind::Property => "install_property",
            InterceptionKind::Method => "install_method",
            InterceptionKind::Factory { .. } => "install_factory",
        };
        match result {
            Ok(InstallOutcome::Installed(key)) => {
                self.push_log(event, "installed", None, key.to_string());
            }
            Ok(InstallOutcome::Skipped { key, reason }) => {
                let outcome = match reason {
                    SkipReason::Inherited => "skipped_inherited",
                    SkipReason::Absent => "skipped_absent",
                };
                self.push_log(event, outcome, None, key.to_string());
            }
            Err(error) => {
                self.push_log(
                    event,
                    "rejected",
                    Some(error.stable_code()),
                    format!("{owner}.{member}: {error}"),
                );
            }
        }
    }

    fn push_log(&self, event: &str, outcome: &str, error_code: Option<&str>, detail: String) {
        if let Ok(mut events) = self.shared.log_events.try_borrow_mut() {
            let event =
                HookLogEvent::new(&self.shared.trace_id, COMPONENT, event, outcome, error_code, detail);
            push_bounded(&mut events, event);
        }
    }
}

/// The callable held by a data descriptor, or `NotCallable`.
fn callable_of(key: &InterceptionKey, desc: &PropertyDescriptor) -> Result<FunctionId, HookError> {
    match desc {
        PropertyDescriptor::Data {
            value: HostValue::Function(id),
            ..
        } => Ok(*id),
        PropertyDescriptor::Data { value, .. } => Err(HookError::NotCallable {
            key: key.clone(),
            found: value.type_name().to_string(),
        }),
        PropertyDescriptor::Accessor { .. } => Err(HookError::NotCallable {
            key: key.clone(),
            found: "accessor".to_string(),
        }),
    }
}

/// A vault entry went missing behind a live wrapper.
fn instrumentation_fault(error: HookError) -> HostError {
    HostError::TypeError(format!("[{}] {error}", error.stable_code()))
}
