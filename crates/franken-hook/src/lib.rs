#![forbid(unsafe_code)]

//! Transparent interception of host object members.
//!
//! An [`Interceptor`] replaces chosen members of host objects with
//! observing wrappers. Reads, writes and calls pass through unchanged while
//! an [`EventRecorder`] writes a deduplicated activity log to an
//! [`ActivitySink`]. Originals are kept in an [`OriginalVault`].

pub mod config;
pub mod error;
pub mod interceptor;
pub mod inventory;
pub mod log_event;
pub mod object_model;
pub mod page_model;
pub mod recorder;
pub mod selector;
pub mod sink;
pub mod vault;

pub use config::{HookConfig, HookSettings, Severity};
pub use error::{HookError, InventoryError, SerializationError, SinkError};
pub use interceptor::{
    CascadeScope, InstallOutcome, InterceptionKind, InterceptionPoint, Interceptor, SkipReason,
};
pub use inventory::{BootstrapReport, HookInventory, OwnerBindings, apply_inventory};
pub use log_event::HookLogEvent;
pub use object_model::{HostError, HostValue, ObjectHandle, PropertyDescriptor, Realm};
pub use recorder::{ActivityRecord, EventRecorder, OpKind, RecordOutcome};
pub use selector::{ArgumentKeyed, FixedMembers, MemberSelector};
pub use sink::{ActivitySink, ConsoleSink, MemorySink, TracingSink};
pub use vault::{InterceptionKey, OriginalVault, VaultEntry};
