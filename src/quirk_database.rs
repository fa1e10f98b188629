/* Quirk database: the built-in model table plus `.quirk` INI files, and the pure resolver that maps
 * DMI identification strings to the fan-speed encoding profile. */
use std::path::Path;

use configparser::ini::Ini;
use tracing::{debug, warn};

const EXCALIBUR_VENDOR: &str = "EXCALIBUR BILGISAYAR SISTEMLERI";

/* Per-model behavior flags. Resolved once at attach time. */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuirkProfile {
    /* Fan speeds arrive in host byte order; when false the two bytes are swapped. */
    pub raw_fan_speed_encoding: bool,
}

impl Default for QuirkProfile {
    fn default() -> Self {
        Self {
            raw_fan_speed_encoding: true,
        }
    }
}

/* One table row. `bios_version: None` matches any firmware. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuirkEntry {
    pub name: String,
    pub sys_vendor: String,
    pub product_name: String,
    pub bios_version: Option<String>,
    pub profile: QuirkProfile,
}

impl QuirkEntry {
    fn matches(&self, vendor: &str, product: &str, bios_version: Option<&str>) -> bool {
        self.sys_vendor == vendor
            && self.product_name == product
            && match &self.bios_version {
                Some(wanted) => bios_version == Some(wanted.as_str()),
                None => true,
            }
    }
}

/* Outcome of a lookup: the profile plus a line the caller can log. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuirkMatch {
    pub profile: QuirkProfile,
    pub entry_name: Option<String>,
    pub description: String,
}

/* Ordered quirk table; the first matching entry wins. */
#[derive(Debug, Clone, Default)]
pub struct QuirkDb {
    entries: Vec<QuirkEntry>,
}

impl QuirkDb {
    pub fn new(entries: Vec<QuirkEntry>) -> Self {
        Self { entries }
    }

    /* The models known to report byte-swapped fan speeds. */
    pub fn builtin() -> Self {
        let swapped = |name: &str, bios: Option<&str>| QuirkEntry {
            name: name.to_string(),
            sys_vendor: EXCALIBUR_VENDOR.to_string(),
            product_name: name.to_string(),
            bios_version: bios.map(str::to_string),
            profile: QuirkProfile {
                raw_fan_speed_encoding: false,
            },
        };

        Self::new(vec![
            swapped("EXCALIBUR G650", None),
            swapped("EXCALIBUR G750", None),
            swapped("EXCALIBUR G670", None),
            swapped("EXCALIBUR G900", Some("CP131")),
        ])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /* Append entries after the existing ones, preserving their order. */
    pub fn extend(&mut self, entries: impl IntoIterator<Item = QuirkEntry>) {
        self.entries.extend(entries);
    }

    /* Exact-match lookup. No match yields the default (raw) profile. */
    pub fn resolve(&self, vendor: &str, product: &str, bios_version: Option<&str>) -> QuirkMatch {
        match self
            .entries
            .iter()
            .find(|e| e.matches(vendor, product, bios_version))
        {
            Some(entry) => QuirkMatch {
                profile: entry.profile,
                entry_name: Some(entry.name.clone()),
                description: format!("Identified laptop model '{}'", entry.name),
            },
            None => QuirkMatch {
                profile: QuirkProfile::default(),
                entry_name: None,
                description: format!(
                    "No quirk entry for '{vendor}' / '{product}', assuming raw fan speed encoding"
                ),
            },
        }
    }
}

/* Load the built-in table followed by every `.quirk` file in `data_dir`.  */
/*                                                                       */
/* Files are read in name order so the resulting table order is stable.  */
pub fn load_quirk_database(data_dir: &Path) -> QuirkDb {
    let mut db = QuirkDb::builtin();

    let entries = match std::fs::read_dir(data_dir) {
        Ok(e) => e,
        Err(err) => {
            debug!("No quirk directory {:?}: {}", data_dir, err);
            return db;
        }
    };

    let mut paths: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("quirk"))
        .collect();
    paths.sort();

    for path in paths {
        match parse_quirk_file(&path) {
            Ok(entry) => {
                debug!("Loaded quirk: {} from {:?}", entry.name, path);
                db.extend([entry]);
            }
            Err(err) => {
                warn!("Failed to parse {:?}: {}", path, err);
            }
        }
    }

    debug!("Quirk database loaded: {} entries", db.len());
    db
}

/* Parse a single `.quirk` INI file into a `QuirkEntry`. */
fn parse_quirk_file(path: &Path) -> Result<QuirkEntry, String> {
    let mut ini = Ini::new();
    ini.load(path).map_err(|e| format!("INI parse error: {}", e))?;
    entry_from_ini(&ini)
}

fn entry_from_ini(ini: &Ini) -> Result<QuirkEntry, String> {
    /* configparser lowercases section and key names by default */
    let sys_vendor = ini
        .get("quirk", "sysvendor")
        .ok_or("Missing [Quirk] SysVendor")?;
    let product_name = ini
        .get("quirk", "productname")
        .ok_or("Missing [Quirk] ProductName")?;
    let name = ini
        .get("quirk", "name")
        .unwrap_or_else(|| product_name.clone());
    let bios_version = ini
        .get("quirk", "biosversion")
        .filter(|v| !v.trim().is_empty());

    let raw = match ini.get("quirk", "rawfanspeed") {
        Some(v) => parse_bool(&v).ok_or_else(|| format!("Invalid RawFanSpeed value '{v}'"))?,
        None => true,
    };

    Ok(QuirkEntry {
        name,
        sys_vendor,
        product_name,
        bios_version,
        profile: QuirkProfile {
            raw_fan_speed_encoding: raw,
        },
    })
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
