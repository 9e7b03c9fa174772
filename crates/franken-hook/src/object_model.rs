//! Host object model for page-like realms.
//!
//! The interception layer needs something to intercept: an arena of objects
//! with own properties, prototype chains, data and accessor descriptors, and
//! native callables invoked with an explicit receiver.  Key features:
//!
//! - **Property descriptors**: data vs accessor, configurable/enumerable/writable
//! - **Prototype chains**: lookups walk `prototype` with cycle and depth guards
//! - **Native functions**: `Rc` closures receiving `&mut Realm`, so a callee may
//!   re-enter the realm (and other intercepted members) freely
//! - **Snapshots**: values render to JSON for logging, with cycle detection
//!
//! A thrown host condition is an `Err(HostError::Thrown(..))`; wrappers
//! propagate it verbatim.
//!
//! `BTreeMap`/`BTreeSet` for deterministic ordering.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::SerializationError;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Opaque handle referencing an object in a [`Realm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHandle(pub u32);

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Opaque handle referencing a native function in a [`Realm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// HostValue
// ---------------------------------------------------------------------------

/// Runtime value of the host object model.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Object(ObjectHandle),
    Function(FunctionId),
}

impl HostValue {
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function(_))
    }

    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            Self::Object(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<FunctionId> {
        match self {
            Self::Function(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "number",
            Self::Str(_) => "string",
            Self::Object(_) => "object",
            Self::Function(_) => "function",
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Object(h) => write!(f, "[{h}]"),
            Self::Function(id) => write!(f, "[{id}]"),
        }
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for HostValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// ---------------------------------------------------------------------------
// PropertyDescriptor
// ---------------------------------------------------------------------------

/// Property descriptor: a stored value or a getter/setter pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyDescriptor {
    Data {
        value: HostValue,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    Accessor {
        get: Option<FunctionId>,
        set: Option<FunctionId>,
        enumerable: bool,
        configurable: bool,
    },
}

impl PropertyDescriptor {
    /// Writable, enumerable, configurable data descriptor.
    pub fn data(value: HostValue) -> Self {
        Self::Data {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Non-writable, non-enumerable, non-configurable data descriptor.
    pub fn data_frozen(value: HostValue) -> Self {
        Self::Data {
            value,
            writable: false,
            enumerable: false,
            configurable: false,
        }
    }

    /// Enumerable, configurable accessor descriptor.
    pub fn accessor(get: Option<FunctionId>, set: Option<FunctionId>) -> Self {
        Self::Accessor {
            get,
            set,
            enumerable: true,
            configurable: true,
        }
    }

    pub fn is_configurable(&self) -> bool {
        match self {
            Self::Data { configurable, .. } | Self::Accessor { configurable, .. } => *configurable,
        }
    }

    pub fn is_enumerable(&self) -> bool {
        match self {
            Self::Data { enumerable, .. } | Self::Accessor { enumerable, .. } => *enumerable,
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data { .. })
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self, Self::Accessor { .. })
    }

    /// Stored value of a data descriptor.
    pub fn value(&self) -> Option<&HostValue> {
        match self {
            Self::Data { value, .. } => Some(value),
            Self::Accessor { .. } => None,
        }
    }

    pub fn is_writable(&self) -> bool {
        match self {
            Self::Data { writable, .. } => *writable,
            Self::Accessor { .. } => false,
        }
    }
}

// ---------------------------------------------------------------------------
// HostError
// ---------------------------------------------------------------------------

/// Errors from object model operations, including conditions thrown by host
/// functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostError {
    /// A value thrown by a host function.
    Thrown(HostValue),
    /// TypeError raised by the object model itself.
    TypeError(String),
    ObjectNotFound(ObjectHandle),
    FunctionNotFound(FunctionId),
    PrototypeCycleDetected,
    PrototypeChainTooDeep { depth: u32, max: u32 },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thrown(value) => write!(f, "uncaught {value}"),
            Self::TypeError(msg) => write!(f, "TypeError: {msg}"),
            Self::ObjectNotFound(h) => write!(f, "{h} not found"),
            Self::FunctionNotFound(id) => write!(f, "{id} not found"),
            Self::PrototypeCycleDetected => write!(f, "TypeError: prototype chain cycle detected"),
            Self::PrototypeChainTooDeep { depth, max } => {
                write!(
                    f,
                    "TypeError: prototype chain depth {depth} exceeds max {max}"
                )
            }
        }
    }
}

impl std::error::Error for HostError {}

// ---------------------------------------------------------------------------
// HostObject
// ---------------------------------------------------------------------------

/// Maximum prototype chain depth to prevent infinite loops.
const MAX_PROTOTYPE_CHAIN_DEPTH: u32 = 1024;

/// Maximum nesting depth rendered by [`Realm::snapshot`].
const MAX_SNAPSHOT_DEPTH: usize = 64;

/// Index of the next arena slot. Panics once the `u32` handle space is spent.
fn next_index(len: usize, arena: &str) -> u32 {
    match u32::try_from(len) {
        Ok(index) => index,
        Err(_) => panic!("{arena} arena exhausted the u32 handle space at {len} entries"),
    }
}

/// Label used for objects without a constructor tag.
pub const DEFAULT_CLASS_TAG: &str = "Object";

/// An ordinary host object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostObject {
    pub prototype: Option<ObjectHandle>,
    pub extensible: bool,
    pub properties: BTreeMap<String, PropertyDescriptor>,
    /// Constructor-derived name (`Window`, `HTMLDocument`, ...).
    pub class_tag: Option<String>,
}

impl Default for HostObject {
    fn default() -> Self {
        Self {
            prototype: None,
            extensible: true,
            properties: BTreeMap::new(),
            class_tag: None,
        }
    }
}

impl HostObject {
    pub fn with_prototype(proto: Option<ObjectHandle>) -> Self {
        Self {
            prototype: proto,
            ..Self::default()
        }
    }

    pub fn get_own_property(&self, member: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(member)
    }

    pub fn has_own_property(&self, member: &str) -> bool {
        self.properties.contains_key(member)
    }

    /// Define or replace an own property.
    ///
    /// Returns `false` when rejected: a non-configurable property may only be
    /// redefined with an identical descriptor, and a non-extensible object
    /// accepts no new members.
    pub fn define_own_property(&mut self, member: &str, desc: PropertyDescriptor) -> bool {
        match self.properties.get(member) {
            Some(current) if !current.is_configurable() => {
                if *current != desc {
                    return false;
                }
            }
            Some(_) => {}
            None if !self.extensible => return false,
            None => {}
        }
        self.properties.insert(member.to_string(), desc);
        true
    }

    /// Delete an own property. Returns `false` if non-configurable.
    pub fn delete(&mut self, member: &str) -> bool {
        match self.properties.get(member) {
            Some(desc) if !desc.is_configurable() => false,
            Some(_) => {
                self.properties.remove(member);
                true
            }
            None => true,
        }
    }

    pub fn own_keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Native functions
// ---------------------------------------------------------------------------

/// Receiver and arguments of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub receiver: HostValue,
    pub args: Vec<HostValue>,
}

impl Invocation {
    pub fn new(receiver: HostValue, args: Vec<HostValue>) -> Self {
        Self { receiver, args }
    }

    /// Argument at `index`, `Undefined` when not passed.
    pub fn arg(&self, index: usize) -> HostValue {
        self.args.get(index).cloned().unwrap_or(HostValue::Undefined)
    }

    /// The receiver as an object, or a TypeError naming `what`.
    pub fn receiver_object(&self, what: &str) -> Result<ObjectHandle, HostError> {
        self.receiver.as_object().ok_or_else(|| {
            HostError::TypeError(format!(
                "{what} called on {} receiver",
                self.receiver.type_name()
            ))
        })
    }
}

/// Behavior of a native function.
pub type NativeFn = Rc<dyn Fn(&mut Realm, Invocation) -> Result<HostValue, HostError>>;

/// A callable registered in a realm.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    /// Declared parameter count.
    pub arity: u32,
    behavior: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Realm
// ---------------------------------------------------------------------------

/// Arena of host objects and native functions.
#[derive(Debug, Default)]
pub struct Realm {
    objects: Vec<HostObject>,
    functions: Vec<NativeFunction>,
}

impl Realm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an object with the given prototype and constructor tag.
    ///
    /// Handles are `u32`, so a realm holds at most `u32::MAX + 1` objects;
    /// allocating past that panics instead of reusing a handle.
    pub fn alloc(&mut self, proto: Option<ObjectHandle>, class_tag: Option<&str>) -> ObjectHandle {
        let handle = ObjectHandle(next_index(self.objects.len(), "object"));
        let mut object = HostObject::with_prototype(proto);
        object.class_tag = class_tag.map(str::to_string);
        self.objects.push(object);
        handle
    }

    pub fn alloc_plain(&mut self) -> ObjectHandle {
        self.alloc(None, None)
    }

    pub fn object(&self, handle: ObjectHandle) -> Result<&HostObject, HostError> {
        self.objects
            .get(handle.0 as usize)
            .ok_or(HostError::ObjectNotFound(handle))
    }

    pub fn object_mut(&mut self, handle: ObjectHandle) -> Result<&mut HostObject, HostError> {
        self.objects
            .get_mut(handle.0 as usize)
            .ok_or(HostError::ObjectNotFound(handle))
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Register a native function.
    pub fn define_function<F>(&mut self, name: &str, arity: u32, behavior: F) -> FunctionId
    where
        F: Fn(&mut Realm, Invocation) -> Result<HostValue, HostError> + 'static,
    {
        self.register_function(name, arity, Rc::new(behavior))
    }

    /// Same `u32` handle-space limit as [`Realm::alloc`].
    pub(crate) fn register_function(&mut self, name: &str, arity: u32, behavior: NativeFn) -> FunctionId {
        let id = FunctionId(next_index(self.functions.len(), "function"));
        self.functions.push(NativeFunction {
            name: name.to_string(),
            arity,
            behavior,
        });
        id
    }

    pub fn function(&self, id: FunctionId) -> Result<&NativeFunction, HostError> {
        self.functions
            .get(id.0 as usize)
            .ok_or(HostError::FunctionNotFound(id))
    }

    /// Register a native function and store it as an own data member.
    pub fn define_method<F>(
        &mut self,
        owner: ObjectHandle,
        name: &str,
        arity: u32,
        behavior: F,
    ) -> Result<FunctionId, HostError>
    where
        F: Fn(&mut Realm, Invocation) -> Result<HostValue, HostError> + 'static,
    {
        let id = self.define_function(name, arity, behavior);
        self.set_own_data(owner, name, HostValue::Function(id))?;
        Ok(id)
    }

    /// Store `value` as a plain own data member of `owner`.
    pub fn set_own_data(
        &mut self,
        owner: ObjectHandle,
        member: &str,
        value: HostValue,
    ) -> Result<(), HostError> {
        self.define_property(owner, member, PropertyDescriptor::data(value))
            .and_then(|accepted| {
                if accepted {
                    Ok(())
                } else {
                    Err(HostError::TypeError(format!(
                        "cannot redefine property: {member}"
                    )))
                }
            })
    }

    /// `Object.defineProperty(O, P, Desc)`. `Ok(false)` when rejected.
    pub fn define_property(
        &mut self,
        owner: ObjectHandle,
        member: &str,
        desc: PropertyDescriptor,
    ) -> Result<bool, HostError> {
        Ok(self.object_mut(owner)?.define_own_property(member, desc))
    }

    pub fn get_own_property(
        &self,
        owner: ObjectHandle,
        member: &str,
    ) -> Result<Option<&PropertyDescriptor>, HostError> {
        Ok(self.object(owner)?.get_own_property(member))
    }

    pub fn has_own_property(&self, owner: ObjectHandle, member: &str) -> Result<bool, HostError> {
        Ok(self.object(owner)?.has_own_property(member))
    }

    /// Constructor-derived label of an owner; `"Object"` when untagged.
    pub fn owner_label(&self, owner: ObjectHandle) -> Result<String, HostError> {
        Ok(self
            .object(owner)?
            .class_tag
            .clone()
            .unwrap_or_else(|| DEFAULT_CLASS_TAG.to_string()))
    }

    /// Find the descriptor for `member`, walking the prototype chain.
    /// Returns the holder alongside a copy of the descriptor.
    pub fn lookup(
        &self,
        owner: ObjectHandle,
        member: &str,
    ) -> Result<Option<(ObjectHandle, PropertyDescriptor)>, HostError> {
        let mut current = Some(owner);
        let mut depth: u32 = 0;
        let mut visited = BTreeSet::new();

        while let Some(h) = current {
            if depth > MAX_PROTOTYPE_CHAIN_DEPTH {
                return Err(HostError::PrototypeChainTooDeep {
                    depth,
                    max: MAX_PROTOTYPE_CHAIN_DEPTH,
                });
            }
            if !visited.insert(h) {
                return Err(HostError::PrototypeCycleDetected);
            }
            let object = self.object(h)?;
            if let Some(desc) = object.get_own_property(member) {
                return Ok(Some((h, desc.clone())));
            }
            current = object.prototype;
            depth += 1;
        }
        Ok(None)
    }

    /// `[[Get]]`: data value, or the getter's result invoked on `owner`.
    pub fn get(&mut self, owner: ObjectHandle, member: &str) -> Result<HostValue, HostError> {
        match self.lookup(owner, member)? {
            Some((_, PropertyDescriptor::Data { value, .. })) => Ok(value),
            Some((_, PropertyDescriptor::Accessor { get: Some(getter), .. })) => {
                self.call(getter, HostValue::Object(owner), Vec::new())
            }
            Some((_, PropertyDescriptor::Accessor { get: None, .. })) | None => {
                Ok(HostValue::Undefined)
            }
        }
    }

    /// `[[Set]]` with strict-mode failure: setters run on `owner`, writes to
    /// inherited data members create an own member on `owner`.
    pub fn set(
        &mut self,
        owner: ObjectHandle,
        member: &str,
        value: HostValue,
    ) -> Result<(), HostError> {
        match self.lookup(owner, member)? {
            Some((_, PropertyDescriptor::Accessor { set: Some(setter), .. })) => {
                self.call(setter, HostValue::Object(owner), vec![value])?;
                Ok(())
            }
            Some((_, PropertyDescriptor::Accessor { set: None, .. })) => Err(HostError::TypeError(
                format!("cannot set property {member} which has only a getter"),
            )),
            Some((_, desc)) if !desc.is_writable() => Err(HostError::TypeError(format!(
                "cannot assign to read only property '{member}'"
            ))),
            Some((holder, _)) if holder == owner => {
                if let Some(PropertyDescriptor::Data { value: slot, .. }) =
                    self.object_mut(owner)?.properties.get_mut(member)
                {
                    *slot = value;
                }
                Ok(())
            }
            Some(_) | None => self.set_own_data(owner, member, value),
        }
    }

    /// Invoke a function with an explicit receiver.
    pub fn call(
        &mut self,
        function: FunctionId,
        receiver: HostValue,
        args: Vec<HostValue>,
    ) -> Result<HostValue, HostError> {
        let behavior = Rc::clone(&self.function(function)?.behavior);
        behavior(self, Invocation::new(receiver, args))
    }

    /// Invoke `callee` if it is callable, TypeError otherwise.
    pub fn call_value(
        &mut self,
        callee: &HostValue,
        receiver: HostValue,
        args: Vec<HostValue>,
    ) -> Result<HostValue, HostError> {
        match callee {
            HostValue::Function(id) => self.call(*id, receiver, args),
            other => Err(HostError::TypeError(format!(
                "{} is not a function",
                other.type_name()
            ))),
        }
    }

    /// `owner.member(...args)`: resolve through `[[Get]]`, call with `owner`
    /// as the receiver.
    pub fn call_method(
        &mut self,
        owner: ObjectHandle,
        member: &str,
        args: Vec<HostValue>,
    ) -> Result<HostValue, HostError> {
        let callee = self.get(owner, member)?;
        if !callee.is_callable() {
            return Err(HostError::TypeError(format!(
                "{}.{member} is not a function",
                self.owner_label(owner)?
            )));
        }
        self.call_value(&callee, HostValue::Object(owner), args)
    }

    // -- Snapshots ----------------------------------------------------------

    /// Render a value to JSON without running any host code.
    ///
    /// Objects render their enumerable own data members; accessors are
    /// skipped so that no getter runs while logging. Functions render as
    /// `"[function <name>]"`, `undefined` as `null`.
    pub fn snapshot(&self, value: &HostValue) -> Result<JsonValue, SerializationError> {
        let mut ancestors = BTreeSet::new();
        self.snapshot_inner(value, &mut ancestors)
    }

    /// Render an argument list as a JSON array.
    pub fn snapshot_all(&self, values: &[HostValue]) -> Result<JsonValue, SerializationError> {
        let mut ancestors = BTreeSet::new();
        values
            .iter()
            .map(|value| self.snapshot_inner(value, &mut ancestors))
            .collect::<Result<Vec<_>, _>>()
            .map(JsonValue::Array)
    }

    fn snapshot_inner(
        &self,
        value: &HostValue,
        ancestors: &mut BTreeSet<ObjectHandle>,
    ) -> Result<JsonValue, SerializationError> {
        match value {
            HostValue::Undefined | HostValue::Null => Ok(JsonValue::Null),
            HostValue::Bool(b) => Ok(JsonValue::Bool(*b)),
            HostValue::Int(n) => Ok(JsonValue::from(*n)),
            HostValue::Str(s) => Ok(JsonValue::String(s.clone())),
            HostValue::Function(id) => {
                let name = self
                    .function(*id)
                    .map(|f| f.name.clone())
                    .map_err(|_| SerializationError::DanglingFunction { function: *id })?;
                Ok(JsonValue::String(format!("[function {name}]")))
            }
            HostValue::Object(handle) => {
                if ancestors.len() >= MAX_SNAPSHOT_DEPTH {
                    return Err(SerializationError::TooDeep {
                        max: MAX_SNAPSHOT_DEPTH,
                    });
                }
                if !ancestors.insert(*handle) {
                    return Err(SerializationError::Circular { object: *handle });
                }
                let object = self
                    .object(*handle)
                    .map_err(|_| SerializationError::DanglingObject { object: *handle })?;
                let mut map = serde_json::Map::new();
                for (member, desc) in &object.properties {
                    if let PropertyDescriptor::Data {
                        value,
                        enumerable: true,
                        ..
                    } = desc
                    {
                        map.insert(member.clone(), self.snapshot_inner(value, ancestors)?);
                    }
                }
                ancestors.remove(handle);
                Ok(JsonValue::Object(map))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_realm() -> (Realm, ObjectHandle) {
        let mut realm = Realm::new();
        let owner = realm.alloc(None, Some("Counter"));
        realm.set_own_data(owner, "count", HostValue::Int(0)).unwrap();
        (realm, owner)
    }

    #[test]
    fn next_index_is_the_arena_length() {
        assert_eq!(next_index(0, "object"), 0);
        assert_eq!(next_index(u32::MAX as usize, "object"), u32::MAX);
        let mut realm = Realm::new();
        let first = realm.alloc_plain();
        let second = realm.alloc_plain();
        assert_eq!((first, second), (ObjectHandle(0), ObjectHandle(1)));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic(expected = "exhausted the u32 handle space")]
    fn next_index_refuses_to_wrap() {
        next_index(u32::MAX as usize + 1, "function");
    }

    #[test]
    fn owner_label_falls_back_to_object() {
        let mut realm = Realm::new();
        let tagged = realm.alloc(None, Some("Window"));
        let plain = realm.alloc_plain();
        assert_eq!(realm.owner_label(tagged).unwrap(), "Window");
        assert_eq!(realm.owner_label(plain).unwrap(), DEFAULT_CLASS_TAG);
    }

    #[test]
    fn get_walks_prototype_chain() {
        let mut realm = Realm::new();
        let proto = realm.alloc_plain();
        realm.set_own_data(proto, "shared", HostValue::Int(7)).unwrap();
        let child = realm.alloc(Some(proto), None);
        assert_eq!(realm.get(child, "shared").unwrap(), HostValue::Int(7));
        assert!(!realm.has_own_property(child, "shared").unwrap());
        assert_eq!(realm.get(child, "missing").unwrap(), HostValue::Undefined);
    }

    #[test]
    fn set_on_inherited_data_creates_own_member() {
        let mut realm = Realm::new();
        let proto = realm.alloc_plain();
        realm.set_own_data(proto, "shared", HostValue::Int(1)).unwrap();
        let child = realm.alloc(Some(proto), None);
        realm.set(child, "shared", HostValue::Int(2)).unwrap();
        assert_eq!(realm.get(child, "shared").unwrap(), HostValue::Int(2));
        assert_eq!(realm.get(proto, "shared").unwrap(), HostValue::Int(1));
    }

    #[test]
    fn set_read_only_is_type_error() {
        let (mut realm, owner) = counter_realm();
        realm
            .define_property(owner, "fixed", PropertyDescriptor::data_frozen(HostValue::Int(1)))
            .unwrap();
        let err = realm.set(owner, "fixed", HostValue::Int(2)).unwrap_err();
        assert!(matches!(err, HostError::TypeError(_)));
    }

    #[test]
    fn accessor_getter_receives_owner() {
        let (mut realm, owner) = counter_realm();
        let getter = realm.define_function("get label", 0, |realm, inv| {
            let this = inv.receiver_object("getter")?;
            Ok(HostValue::Str(realm.owner_label(this)?))
        });
        realm
            .define_property(owner, "label", PropertyDescriptor::accessor(Some(getter), None))
            .unwrap();
        assert_eq!(realm.get(owner, "label").unwrap(), HostValue::from("Counter"));
        let err = realm.set(owner, "label", HostValue::Null).unwrap_err();
        assert!(matches!(err, HostError::TypeError(_)));
    }

    #[test]
    fn call_method_binds_receiver_and_propagates_throw() {
        let (mut realm, owner) = counter_realm();
        realm
            .define_method(owner, "bump", 0, |realm, inv| {
                let this = inv.receiver_object("bump")?;
                let HostValue::Int(n) = realm.get(this, "count")? else {
                    return Err(HostError::Thrown(HostValue::from("bad count")));
                };
                realm.set(this, "count", HostValue::Int(n + 1))?;
                Ok(HostValue::Int(n + 1))
            })
            .unwrap();
        realm
            .define_method(owner, "fail", 0, |_, _| {
                Err(HostError::Thrown(HostValue::from("boom")))
            })
            .unwrap();

        assert_eq!(realm.call_method(owner, "bump", vec![]).unwrap(), HostValue::Int(1));
        assert_eq!(realm.call_method(owner, "bump", vec![]).unwrap(), HostValue::Int(2));
        assert_eq!(
            realm.call_method(owner, "fail", vec![]).unwrap_err(),
            HostError::Thrown(HostValue::from("boom"))
        );
        assert!(matches!(
            realm.call_method(owner, "count", vec![]).unwrap_err(),
            HostError::TypeError(_)
        ));
    }

    #[test]
    fn non_configurable_rejects_redefinition() {
        let (mut realm, owner) = counter_realm();
        realm
            .define_property(owner, "locked", PropertyDescriptor::data_frozen(HostValue::Int(1)))
            .unwrap();
        let accepted = realm
            .define_property(owner, "locked", PropertyDescriptor::accessor(None, None))
            .unwrap();
        assert!(!accepted);
    }

    #[test]
    fn prototype_cycle_is_detected() {
        let mut realm = Realm::new();
        let a = realm.alloc_plain();
        let b = realm.alloc(Some(a), None);
        realm.object_mut(a).unwrap().prototype = Some(b);
        assert_eq!(
            realm.lookup(a, "x").unwrap_err(),
            HostError::PrototypeCycleDetected
        );
    }

    #[test]
    fn snapshot_renders_enumerable_data_only() {
        let (mut realm, owner) = counter_realm();
        let getter = realm.define_function("get hidden", 0, |_, _| Ok(HostValue::Int(9)));
        realm
            .define_property(owner, "hidden", PropertyDescriptor::accessor(Some(getter), None))
            .unwrap();
        realm.set_own_data(owner, "name", HostValue::from("c")).unwrap();
        let json = realm.snapshot(&HostValue::Object(owner)).unwrap();
        assert_eq!(json, serde_json::json!({"count": 0, "name": "c"}));
    }

    #[test]
    fn snapshot_detects_cycles_but_allows_shared_children() {
        let mut realm = Realm::new();
        let shared = realm.alloc_plain();
        let parent = realm.alloc_plain();
        realm.set_own_data(parent, "a", HostValue::Object(shared)).unwrap();
        realm.set_own_data(parent, "b", HostValue::Object(shared)).unwrap();
        assert!(realm.snapshot(&HostValue::Object(parent)).is_ok());

        realm.set_own_data(shared, "back", HostValue::Object(parent)).unwrap();
        let err = realm.snapshot(&HostValue::Object(parent)).unwrap_err();
        assert!(matches!(err, SerializationError::Circular { .. }));
    }

    #[test]
    fn snapshot_all_renders_argument_list() {
        let mut realm = Realm::new();
        let f = realm.define_function("cb", 1, |_, _| Ok(HostValue::Undefined));
        let json = realm
            .snapshot_all(&[HostValue::from("a"), HostValue::Int(1), HostValue::Function(f)])
            .unwrap();
        assert_eq!(json, serde_json::json!(["a", 1, "[function cb]"]));
    }
}
