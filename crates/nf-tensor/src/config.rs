use crate::error::{Result, TensorError};

/// Environment variable overriding the device memory limit, in MiB.
pub const DEVICE_MEMORY_ENV: &str = "NFORGE_DEVICE_MEMORY_MB";

const DEFAULT_DEVICE_MEMORY: usize = 1 << 30;

/// Configuration for the device backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Bytes of device memory available to tensor storage.
    pub memory_limit_bytes: usize,
}

impl DeviceConfig {
    /// Create a config with an explicit memory limit.
    pub fn with_memory_limit(memory_limit_bytes: usize) -> Self {
        DeviceConfig { memory_limit_bytes }
    }

    /// Read the config from the environment.
    ///
    /// Reads `NFORGE_DEVICE_MEMORY_MB`; an unset variable yields the default
    /// (1 GiB).
    pub fn from_env() -> Result<Self> {
        match std::env::var(DEVICE_MEMORY_ENV) {
            Ok(raw) => Self::parse_megabytes(&raw),
            Err(std::env::VarError::NotPresent) => Ok(Self::default()),
            Err(e) => Err(TensorError::Config(format!("{DEVICE_MEMORY_ENV}: {e}"))),
        }
    }

    fn parse_megabytes(raw: &str) -> Result<Self> {
        let mb: usize = raw.trim().parse().map_err(|e| {
            TensorError::Config(format!("{DEVICE_MEMORY_ENV}={raw:?}: {e}"))
        })?;
        let bytes = mb.checked_mul(1 << 20).ok_or_else(|| {
            TensorError::Config(format!("{DEVICE_MEMORY_ENV}={raw:?}: value too large"))
        })?;
        Ok(Self::with_memory_limit(bytes))
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::with_memory_limit(DEFAULT_DEVICE_MEMORY)
    }
}
