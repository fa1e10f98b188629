/* Daemon configuration: the INI file under /etc plus environment overrides, resolved once at
 * startup into a plain struct. */
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use configparser::ini::Ini;
use tracing::debug;

use crate::driver::AcpiCallConfig;
use crate::driver::channel::DEFAULT_INSTANCE;
use crate::driver::excalibur::EXCALIBUR_WMI_GUID;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/excaliburd/excaliburd.conf";
pub const DEFAULT_DATA_DIR: &str = "/usr/share/excaliburd";
pub const DEFAULT_ACPI_CALL_PATH: &str = "/proc/acpi/call";

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory scanned for `.quirk` files.
    pub data_dir: PathBuf,
    pub wmi: WmiConfig,
    /// JSON description of a simulated controller. Only honored with `dev-hooks`.
    pub test_device: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WmiConfig {
    pub guid: String,
    pub call_path: PathBuf,
    /* ACPI paths of the WMI block's set/query methods. Model specific, so no defaults. */
    pub set_block_method: Option<String>,
    pub query_block_method: Option<String>,
    pub instance: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            wmi: WmiConfig::default(),
            test_device: None,
        }
    }
}

impl Default for WmiConfig {
    fn default() -> Self {
        Self {
            guid: EXCALIBUR_WMI_GUID.to_string(),
            call_path: PathBuf::from(DEFAULT_ACPI_CALL_PATH),
            set_block_method: None,
            query_block_method: None,
            instance: DEFAULT_INSTANCE,
        }
    }
}

impl WmiConfig {
    /// Build the acpi_call transport settings. Both method paths must be configured.
    pub fn acpi_call(&self) -> Result<AcpiCallConfig> {
        let set_method = self
            .set_block_method
            .clone()
            .ok_or_else(|| anyhow!("[Wmi] SetBlockMethod is not configured"))?;
        let query_method = self
            .query_block_method
            .clone()
            .ok_or_else(|| anyhow!("[Wmi] QueryBlockMethod is not configured"))?;
        Ok(AcpiCallConfig {
            call_path: self.call_path.clone(),
            set_method,
            query_method,
        })
    }
}

impl Config {
    /// Load from `EXCALIBURD_CONFIG` (or the default path), then apply `EXCALIBURD_DATA_DIR`.
    pub fn load() -> Result<Self> {
        let path = std::env::var("EXCALIBURD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = Self::from_file(&path)?;

        if let Ok(dir) = std::env::var("EXCALIBURD_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    /// Parse a config file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Parse config text in INI form.
    pub fn parse(text: &str) -> Result<Self> {
        let mut ini = Ini::new();
        ini.read(text.to_string()).map_err(|e| anyhow!(e))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self> {
        let mut config = Self::default();

        /* configparser lowercases section and key names by default */
        if let Some(dir) = ini.get("daemon", "datadir") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(guid) = ini.get("wmi", "guid") {
            config.wmi.guid = guid;
        }
        if let Some(path) = ini.get("wmi", "callpath") {
            config.wmi.call_path = PathBuf::from(path);
        }
        config.wmi.set_block_method = ini.get("wmi", "setblockmethod");
        config.wmi.query_block_method = ini.get("wmi", "queryblockmethod");
        if let Some(instance) = ini
            .getuint("wmi", "instance")
            .map_err(|e| anyhow!("[Wmi] Instance: {e}"))?
        {
            config.wmi.instance = u8::try_from(instance)
                .with_context(|| format!("[Wmi] Instance {instance} out of range"))?;
        }
        config.test_device = ini.get("testdevice", "path").map(PathBuf::from);

        Ok(config)
    }
}
