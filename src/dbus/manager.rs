/* DBus Manager interface: entry point describing the attached laptop (DMI identity, resolved quirk,
 * firmware version) and listing the sensor objects. */
use zbus::interface;
use zbus::zvariant::ObjectPath;

use crate::dmi::HardwareIdentity;
use crate::quirk_database::QuirkMatch;

/// DBus API version.
pub const API_VERSION: i32 = 1;

/// Attach-time facts published by the Manager. Fixed for the daemon's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerInfo {
    pub vendor: String,
    pub product: String,
    pub bios_version: String,
    pub quirk_match: String,
    /// Name of the matched quirk entry, empty for the fallback profile.
    pub quirk_entry: String,
    pub raw_fan_speed: bool,
    pub firmware_version: String,
}

impl ManagerInfo {
    pub fn new(identity: &HardwareIdentity, quirk: &QuirkMatch, firmware: [u32; 5]) -> Self {
        Self {
            vendor: identity.sys_vendor.clone(),
            product: identity.product_name.clone(),
            bios_version: identity.bios_version.clone().unwrap_or_default(),
            quirk_match: quirk.description.clone(),
            quirk_entry: quirk.entry_name.clone().unwrap_or_default(),
            raw_fan_speed: quirk.profile.raw_fan_speed_encoding,
            firmware_version: format_firmware_words(&firmware),
        }
    }
}

/* Render the firmware-version registers as space separated hex words. */
pub fn format_firmware_words(words: &[u32]) -> String {
    words
        .iter()
        .map(|w| format!("{w:08x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The `org.freedesktop.excalibur1.Manager` interface.
///
/// Everything here is resolved before the bus name is taken, so no
/// property touches the firmware.
pub struct ExcaliburManager {
    info: ManagerInfo,
    sensors: Vec<String>,
}

impl ExcaliburManager {
    pub fn new(info: ManagerInfo, sensors: Vec<String>) -> Self {
        Self { info, sensors }
    }
}

#[interface(name = "org.freedesktop.excalibur1.Manager")]
impl ExcaliburManager {
    /// The DBus API version (constant, read-only).
    #[zbus(property, name = "APIVersion")]
    fn api_version(&self) -> i32 {
        API_VERSION
    }

    /// DMI system vendor.
    #[zbus(property)]
    fn vendor(&self) -> String {
        self.info.vendor.clone()
    }

    /// DMI product name.
    #[zbus(property)]
    fn product(&self) -> String {
        self.info.product.clone()
    }

    /// DMI BIOS version, empty when the firmware does not report one.
    #[zbus(property)]
    fn bios_version(&self) -> String {
        self.info.bios_version.clone()
    }

    /// How the quirk table resolved this machine.
    #[zbus(property)]
    fn quirk_match(&self) -> String {
        self.info.quirk_match.clone()
    }

    #[zbus(property)]
    fn quirk_entry(&self) -> String {
        self.info.quirk_entry.clone()
    }

    #[zbus(property)]
    fn raw_fan_speed(&self) -> bool {
        self.info.raw_fan_speed
    }

    /// Register block returned by the attach handshake.
    #[zbus(property)]
    fn firmware_version(&self) -> String {
        self.info.firmware_version.clone()
    }

    /// Array of object paths to the sensor channels.
    #[zbus(property)]
    fn sensors(&self) -> Vec<ObjectPath<'static>> {
        self.sensors
            .iter()
            .filter_map(|p| ObjectPath::try_from(p.clone()).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quirk_database::QuirkDb;

    #[test]
    fn test_format_firmware_words() {
        assert_eq!(
            format_firmware_words(&[0x4350_3133, 1, 0, 0xffff_ffff, 0x10]),
            "43503133 00000001 00000000 ffffffff 00000010"
        );
        assert_eq!(format_firmware_words(&[]), "");
    }

    #[test]
    fn test_manager_info_from_attach() {
        let identity = HardwareIdentity {
            sys_vendor: "EXCALIBUR BILGISAYAR SISTEMLERI".into(),
            product_name: "EXCALIBUR G670".into(),
            bios_version: None,
        };
        let quirk = QuirkDb::builtin().resolve(
            &identity.sys_vendor,
            &identity.product_name,
            identity.bios_version.as_deref(),
        );
        let info = ManagerInfo::new(&identity, &quirk, [1, 2, 3, 4, 5]);

        assert_eq!(info.product, "EXCALIBUR G670");
        assert_eq!(info.bios_version, "");
        assert!(!info.raw_fan_speed);
        assert_eq!(info.quirk_match, "Identified laptop model 'EXCALIBUR G670'");
        assert_eq!(info.quirk_entry, "EXCALIBUR G670");
        assert_eq!(
            info.firmware_version,
            "00000001 00000002 00000003 00000004 00000005"
        );
    }

    #[test]
    fn test_manager_info_unknown_model() {
        let identity = HardwareIdentity {
            sys_vendor: "EXCALIBUR BILGISAYAR SISTEMLERI".into(),
            product_name: "EXCALIBUR G999".into(),
            bios_version: Some("CP100".into()),
        };
        let quirk = QuirkDb::builtin().resolve(
            &identity.sys_vendor,
            &identity.product_name,
            identity.bios_version.as_deref(),
        );
        let info = ManagerInfo::new(&identity, &quirk, [0; 5]);

        assert_eq!(info.quirk_entry, "");
        assert!(info.raw_fan_speed);
        assert_eq!(info.bios_version, "CP100");
    }
}
