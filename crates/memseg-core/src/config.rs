//! Memory configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Size of each backing block an unbounded arena carves slices from.
    pub arena_block_size: usize,

    /// Zero-fill freshly allocated native segments.
    pub zero_fill_native: bool,

    /// Alignment the native allocation backend honours without padding.
    /// Larger requests over-allocate and align into the block.
    pub max_malloc_align: usize,

    /// Backoff iterations a shared-scope close waits for in-flight accesses
    /// before it rolls the scope back to alive and fails.
    pub handshake_spin_limit: u32,

    /// Warn when an explicit scope is reclaimed without being closed.
    pub warn_on_leaked_scope: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            arena_block_size: 4 * 1024,
            zero_fill_native: true,
            max_malloc_align: 16,
            handshake_spin_limit: 1 << 16,
            warn_on_leaked_scope: true,
        }
    }
}

impl MemoryConfig {
    /// Defaults overridden by `MEMSEG_*` environment variables.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("MEMSEG_ARENA_BLOCK_SIZE") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.arena_block_size = v;
            }
        }

        if let Ok(s) = std::env::var("MEMSEG_ZERO_FILL") {
            if let Some(v) = parse_flag(&s) {
                cfg.zero_fill_native = v;
            }
        }

        if let Ok(s) = std::env::var("MEMSEG_MAX_MALLOC_ALIGN") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_malloc_align = v;
            }
        }

        if let Ok(s) = std::env::var("MEMSEG_HANDSHAKE_SPINS") {
            if let Ok(v) = s.parse::<u32>() {
                cfg.handshake_spin_limit = v;
            }
        }

        if let Ok(s) = std::env::var("MEMSEG_WARN_LEAKED_SCOPE") {
            if let Some(v) = parse_flag(&s) {
                cfg.warn_on_leaked_scope = v;
            }
        }

        cfg
    }

    /// Reject settings the allocators cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.arena_block_size == 0 {
            return Err(Error::Config("arena_block_size must be > 0".into()));
        }
        if !self.max_malloc_align.is_power_of_two() {
            return Err(Error::Config(format!(
                "max_malloc_align must be a power of two (got {})",
                self.max_malloc_align
            )));
        }
        if self.handshake_spin_limit == 0 {
            return Err(Error::Config("handshake_spin_limit must be > 0".into()));
        }
        Ok(())
    }

    /// `from_env()` when it validates, otherwise the defaults.
    pub fn from_env_or_default() -> Self {
        let cfg = Self::from_env();
        match cfg.validate() {
            Ok(()) => cfg,
            Err(_) => Self::default(),
        }
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = MemoryConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.arena_block_size, 4096);
        assert!(cfg.zero_fill_native);
    }

    #[test]
    fn rejects_bad_alignment() {
        let cfg = MemoryConfig {
            max_malloc_align: 24,
            ..MemoryConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_zero_block_size() {
        let cfg = MemoryConfig {
            arena_block_size: 0,
            ..MemoryConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let cfg = MemoryConfig::from_json(r#"{ "arena_block_size": 65536 }"#).unwrap();
        assert_eq!(cfg.arena_block_size, 65536);
        assert_eq!(cfg.max_malloc_align, 16);
    }

    #[test]
    fn flags_parse_loosely() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
