/* excaliburd-rs entrypoint: sets up tracing, loads the configuration and quirk database, identifies
 * the laptop, performs the firmware handshake, and starts the DBus server. */
mod config;
mod controller;
mod dbus;
mod device;
mod dmi;
mod driver;
mod error;
mod quirk_database;
mod sensor;
#[cfg(any(test, feature = "dev-hooks"))]
mod test_device;

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::controller::ExcaliburController;
use crate::dmi::HardwareIdentity;
use crate::driver::channel::FirmwareChannel;
use crate::driver::{AcpiCallTransport, WmiTransport};

const OLD_CPU_ADVISORY: &str =
    "If you are using an Intel CPU older than 10th gen, contact the driver maintainer.";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        "Starting excaliburd-rs version {} (API version {})",
        env!("CARGO_PKG_VERSION"),
        dbus::manager::API_VERSION
    );

    let config = Config::load().context("Failed to load configuration")?;

    /* Built-in quirk table plus any .quirk files from the data directory */
    let quirk_db = quirk_database::load_quirk_database(&config.data_dir);

    let (identity, transport) = attach(&config)?;

    let quirk = quirk_db.resolve(
        &identity.sys_vendor,
        &identity.product_name,
        identity.bios_version.as_deref(),
    );
    info!("{}", quirk.description);
    if quirk.profile.raw_fan_speed_encoding {
        warn!("{OLD_CPU_ADVISORY}");
    }

    let ctl = Arc::new(ExcaliburController::new(
        FirmwareChannel::new(transport).with_instance(config.wmi.instance),
        quirk.profile,
    ));

    /* Nothing is exposed until the controller answers a read */
    let firmware = {
        let ctl = Arc::clone(&ctl);
        tokio::task::spawn_blocking(move || ctl.probe())
            .await?
            .context("Firmware handshake failed")?
    };
    info!(
        "Controller attached via {} transport (firmware {})",
        ctl.transport_name(),
        dbus::manager::format_firmware_words(&firmware)
    );

    let info = dbus::manager::ManagerInfo::new(&identity, &quirk, firmware);

    /* Run the DBus server (blocks until shutdown) */
    dbus::run_server(ctl, info).await?;

    Ok(())
}

/* Identify the machine and open the firmware transport. */
fn attach(config: &Config) -> Result<(HardwareIdentity, Box<dyn WmiTransport>)> {
    #[cfg(feature = "dev-hooks")]
    if let Some(path) = &config.test_device {
        let sim = test_device::SimulatedController::from_json_file(path)?;
        let spec = sim.spec();
        warn!("Using simulated controller from {}", path.display());

        let identity = HardwareIdentity {
            sys_vendor: spec.vendor,
            product_name: spec.product,
            bios_version: spec.bios_version,
        };
        return Ok((identity, Box::new(sim)));
    }

    #[cfg(not(feature = "dev-hooks"))]
    if config.test_device.is_some() {
        warn!("[TestDevice] Path ignored: built without dev-hooks");
    }

    let identity = dmi::read_identity();
    info!(
        "Machine: '{}' / '{}' (BIOS {})",
        identity.sys_vendor,
        identity.product_name,
        identity.bios_version.as_deref().unwrap_or("unknown")
    );

    let present = dmi::wmi_guid_present(&config.wmi.guid)
        .map_err(|e| anyhow!(e))
        .context("Failed to enumerate WMI devices")?;
    if !present {
        bail!("WMI block {} not present on this machine", config.wmi.guid);
    }

    let acpi = config.wmi.acpi_call()?;
    info!("Using acpi_call interface at {}", acpi.call_path.display());
    Ok((identity, Box::new(AcpiCallTransport::new(acpi))))
}
