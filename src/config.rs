use crate::interop::PointerWidth;
use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Validate arguments before marshalling; disables the wrap fast path
    #[serde(default = "default_true")]
    pub strict_checks: bool,

    #[serde(default)]
    pub pointer_width: PointerWidth,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

/// Layout of the default linear memory and arena window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_memory_size")]
    pub size: usize,

    #[serde(default = "default_stack_base")]
    pub stack_base: usize,

    #[serde(default = "default_stack_size")]
    pub stack_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            strict_checks: true,
            pointer_width: PointerWidth::native(),
            memory: MemoryConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            size: default_memory_size(),
            stack_base: default_stack_base(),
            stack_size: default_stack_size(),
        }
    }
}

fn default_true() -> bool { true }
fn default_memory_size() -> usize { 1 << 20 }
fn default_stack_base() -> usize { 64 * 1024 }
fn default_stack_size() -> usize { 64 * 1024 }

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content)
            .map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Defaults overlaid with environment variables
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Overlay `CCALL_*` environment variables on this config
    ///
    /// Unparseable values are ignored.
    pub fn with_env(mut self) -> Self {
        if let Ok(strict) = std::env::var("CCALL_STRICT") {
            match strict.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.strict_checks = true,
                "0" | "false" | "no" | "off" => self.strict_checks = false,
                _ => {}
            }
        }

        if let Ok(width) = std::env::var("CCALL_POINTER_WIDTH") {
            match width.to_lowercase().as_str() {
                "narrow" | "32" => self.pointer_width = PointerWidth::Narrow,
                "wide" | "64" => self.pointer_width = PointerWidth::Wide,
                _ => {}
            }
        }

        self.logging = self.logging.with_env();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_checked_and_native() {
        let config = BridgeConfig::default();
        assert!(config.strict_checks);
        assert_eq!(config.pointer_width, PointerWidth::native());
        assert_eq!(config.memory.size, 1 << 20);
        assert_eq!(config.memory.stack_base, 65536);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parse_partial_document() {
        let config = BridgeConfig::parse(
            r#"
            strict_checks = false
            pointer_width = "wide"

            [memory]
            stack_size = 4096

            [logging]
            level = "debug"
            json = true
            "#,
        )
        .unwrap();

        assert!(!config.strict_checks);
        assert_eq!(config.pointer_width, PointerWidth::Wide);
        assert_eq!(config.memory.stack_size, 4096);
        assert_eq!(config.memory.stack_base, 65536);
        assert!(config.logging.json_format);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn parse_rejects_unknown_width() {
        let err = BridgeConfig::parse("pointer_width = \"huge\"").unwrap_err();
        assert!(err.starts_with("Failed to parse config"));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "strict_checks = false").unwrap();
        writeln!(file, "[logging]").unwrap();
        writeln!(file, "file = \"bridge.log\"").unwrap();

        let config = BridgeConfig::load(file.path()).unwrap();
        assert!(!config.strict_checks);
        assert_eq!(config.logging.log_path.as_deref(), Some("bridge.log"));
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = BridgeConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.starts_with("Failed to read config"));
    }
}
