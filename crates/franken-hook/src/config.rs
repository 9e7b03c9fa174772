//! Runtime hook configuration.
//!
//! `HookSettings` is the plain, serde-loadable form used at load time.
//! `HookConfig` is the live, shared form: every field may be flipped at any
//! moment from an operator console (any thread), and the recorder reads it
//! on each emission decision.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Severity at which emitted records are routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    const fn to_bits(self) -> u8 {
        match self {
            Self::Info => 0,
            Self::Warn => 1,
            Self::Error => 2,
        }
    }

    const fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Self::Info,
            1 => Self::Warn,
            _ => Self::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load-time hook settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookSettings {
    /// Trigger the breakpoint handler on every observed operation.
    pub debugger_on_event: bool,
    /// Emit records to the sink.
    pub logging_enabled: bool,
    pub severity: Severity,
}

impl Default for HookSettings {
    fn default() -> Self {
        Self {
            debugger_on_event: false,
            logging_enabled: true,
            severity: Severity::Info,
        }
    }
}

impl HookSettings {
    /// Parse settings from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Live hook configuration, shared by reference.
#[derive(Debug)]
pub struct HookConfig {
    debugger_on_event: AtomicBool,
    logging_enabled: AtomicBool,
    severity: AtomicU8,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self::new(&HookSettings::default())
    }
}

impl HookConfig {
    pub fn new(settings: &HookSettings) -> Self {
        Self {
            debugger_on_event: AtomicBool::new(settings.debugger_on_event),
            logging_enabled: AtomicBool::new(settings.logging_enabled),
            severity: AtomicU8::new(settings.severity.to_bits()),
        }
    }

    pub fn shared(settings: &HookSettings) -> Arc<Self> {
        Arc::new(Self::new(settings))
    }

    pub fn debugger_on_event(&self) -> bool {
        self.debugger_on_event.load(Ordering::SeqCst)
    }

    pub fn set_debugger_on_event(&self, enabled: bool) {
        self.debugger_on_event.store(enabled, Ordering::SeqCst);
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging_enabled.load(Ordering::SeqCst)
    }

    pub fn set_logging_enabled(&self, enabled: bool) {
        self.logging_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn severity(&self) -> Severity {
        Severity::from_bits(self.severity.load(Ordering::SeqCst))
    }

    pub fn set_severity(&self, severity: Severity) {
        self.severity.store(severity.to_bits(), Ordering::SeqCst);
    }

    /// Current values as plain settings.
    pub fn snapshot(&self) -> HookSettings {
        HookSettings {
            debugger_on_event: self.debugger_on_event(),
            logging_enabled: self.logging_enabled(),
            severity: self.severity(),
        }
    }

    /// Overwrite every field from `settings`.
    pub fn apply(&self, settings: &HookSettings) {
        self.set_debugger_on_event(settings.debugger_on_event);
        self.set_logging_enabled(settings.logging_enabled);
        self.set_severity(settings.severity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_log_without_debugger() {
        let settings = HookSettings::default();
        assert!(settings.logging_enabled);
        assert!(!settings.debugger_on_event);
        assert_eq!(settings.severity, Severity::Info);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings = HookSettings::from_json_str(r#"{"severity":"warn"}"#).unwrap();
        assert_eq!(settings.severity, Severity::Warn);
        assert!(settings.logging_enabled);
    }

    #[test]
    fn unknown_severity_is_rejected() {
        assert!(HookSettings::from_json_str(r#"{"severity":"fatal"}"#).is_err());
    }

    #[test]
    fn live_config_mutation_is_visible_through_shared_handle() {
        let config = HookConfig::shared(&HookSettings::default());
        let console = Arc::clone(&config);
        console.set_logging_enabled(false);
        console.set_severity(Severity::Error);
        console.set_debugger_on_event(true);
        assert_eq!(
            config.snapshot(),
            HookSettings {
                debugger_on_event: true,
                logging_enabled: false,
                severity: Severity::Error,
            }
        );
    }

    #[test]
    fn toggling_from_another_thread() {
        let config = HookConfig::shared(&HookSettings::default());
        let console = Arc::clone(&config);
        std::thread::spawn(move || console.set_severity(Severity::Warn))
            .join()
            .unwrap();
        assert_eq!(config.severity(), Severity::Warn);
    }

    #[test]
    fn apply_overwrites_all_fields() {
        let config = HookConfig::default();
        let settings = HookSettings {
            debugger_on_event: true,
            logging_enabled: false,
            severity: Severity::Warn,
        };
        config.apply(&settings);
        assert_eq!(config.snapshot(), settings);
    }

    #[test]
    fn severity_display_and_serde() {
        for severity in [Severity::Info, Severity::Warn, Severity::Error] {
            let json = serde_json::to_string(&severity).expect("serialize");
            assert_eq!(json, format!("\"{severity}\""));
            let restored: Severity = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(restored, severity);
        }
    }
}
