/* Hardware identification through udev: DMI strings for quirk matching and the WMI bus check that
 * gates attaching to the controller. */
use std::path::Path;

use tracing::{debug, warn};

const DMI_SYSPATH: &str = "/sys/class/dmi/id";

/* DMI strings the quirk resolver matches on. */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareIdentity {
    pub sys_vendor: String,
    pub product_name: String,
    pub bios_version: Option<String>,
}

impl HardwareIdentity {
    /* Build from an attribute lookup. Missing or blank attributes become empty / `None`. */
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            sys_vendor: get("sys_vendor").unwrap_or_default(),
            product_name: get("product_name").unwrap_or_default(),
            bios_version: get("bios_version"),
        }
    }
}

/* Read the DMI identity of this machine.                         */
/*                                                                */
/* The `udev` crate types are not `Send`; call this from sync code */
/* or inside `spawn_blocking`.                                     */
pub fn read_identity() -> HardwareIdentity {
    let device = match udev::Device::from_syspath(Path::new(DMI_SYSPATH)) {
        Ok(d) => d,
        Err(e) => {
            warn!("Cannot open {}: {}", DMI_SYSPATH, e);
            return HardwareIdentity::default();
        }
    };

    let identity = HardwareIdentity::from_lookup(|name| {
        device
            .attribute_value(name)
            .map(|v| v.to_string_lossy().to_string())
    });
    debug!("DMI identity: {:?}", identity);
    identity
}

/* WMI device sysnames are the GUID, optionally followed by `-<n>`. */
fn sysname_matches_guid(sysname: &str, guid: &str) -> bool {
    sysname
        .get(..guid.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(guid))
}

/* Whether the WMI bus exposes a block with `guid`. */
pub fn wmi_guid_present(guid: &str) -> Result<bool, String> {
    let mut enumerator =
        udev::Enumerator::new().map_err(|e| format!("udev enumerator: {}", e))?;
    enumerator
        .match_subsystem("wmi")
        .map_err(|e| format!("match_subsystem: {}", e))?;

    let devices = enumerator
        .scan_devices()
        .map_err(|e| format!("scan_devices: {}", e))?;

    for device in devices {
        let sysname = device.sysname().to_string_lossy().to_string();
        if sysname_matches_guid(&sysname, guid) {
            debug!("Found WMI block {}", sysname);
            return Ok(true);
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::excalibur::EXCALIBUR_WMI_GUID;

    #[test]
    fn test_sysname_matches_guid() {
        assert!(sysname_matches_guid(EXCALIBUR_WMI_GUID, EXCALIBUR_WMI_GUID));
        assert!(sysname_matches_guid(
            "644c5791-b7b0-4123-a90b-e93876e0daad-1",
            EXCALIBUR_WMI_GUID
        ));
        assert!(!sysname_matches_guid(
            "05901221-D566-11D1-B2F0-00A0C9062910",
            EXCALIBUR_WMI_GUID
        ));
        assert!(!sysname_matches_guid("644C5791", EXCALIBUR_WMI_GUID));
    }

    #[test]
    fn test_identity_from_lookup() {
        let identity = HardwareIdentity::from_lookup(|name| match name {
            "sys_vendor" => Some("EXCALIBUR BILGISAYAR SISTEMLERI\n".to_string()),
            "product_name" => Some("EXCALIBUR G900".to_string()),
            "bios_version" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(identity.sys_vendor, "EXCALIBUR BILGISAYAR SISTEMLERI");
        assert_eq!(identity.product_name, "EXCALIBUR G900");
        assert_eq!(identity.bios_version, None);
    }

    #[test]
    fn test_identity_missing_attributes() {
        let identity = HardwareIdentity::from_lookup(|_| None);
        assert_eq!(identity, HardwareIdentity::default());
    }
}
