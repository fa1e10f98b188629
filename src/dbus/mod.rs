/* DBus surface: zbus interface implementations for the Manager, the hwmon-style sensors and the
 * keyboard backlight LED, plus the glue that runs blocking controller calls off the runtime. */
pub mod led;
pub mod manager;
pub mod sensor;

use std::sync::Arc;

use anyhow::Result;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};
use zbus::connection::Builder;

use crate::controller::ExcaliburController;
use crate::error::ExcaliburError;
use crate::sensor::SensorChannel;

pub const BUS_NAME: &str = "org.freedesktop.excalibur1";
pub const MANAGER_PATH: &str = "/org/freedesktop/excalibur1";
pub const LED_PATH: &str = "/org/freedesktop/excalibur1/leds/kbd_backlight";

/// Object path of a sensor channel.
pub fn sensor_path(channel: SensorChannel) -> String {
    format!("{MANAGER_PATH}/hwmon/{}", channel.name())
}

/// Translate a controller error into a DBus error, keeping the errno name.
pub(crate) fn to_fdo_error(err: ExcaliburError) -> zbus::fdo::Error {
    let msg = format!("{:?}: {err}", err.errno());
    match err {
        ExcaliburError::Io(_) => zbus::fdo::Error::IOError(msg),
        ExcaliburError::InvalidArgument(_) => zbus::fdo::Error::InvalidArgs(msg),
        ExcaliburError::NotSupported(_) => zbus::fdo::Error::NotSupported(msg),
    }
}

/// Run a controller operation on the blocking pool.
///
/// Controller calls take a `parking_lot` mutex and perform synchronous
/// firmware I/O, so they never run directly on a runtime worker.
pub(crate) async fn call_blocking<T, F>(
    ctl: &Arc<ExcaliburController>,
    op: F,
) -> zbus::fdo::Result<T>
where
    F: FnOnce(&ExcaliburController) -> Result<T, ExcaliburError> + Send + 'static,
    T: Send + 'static,
{
    let ctl = Arc::clone(ctl);
    tokio::task::spawn_blocking(move || op(&ctl))
        .await
        .map_err(|e| {
            warn!("Controller task failed: {e}");
            zbus::fdo::Error::Failed(format!("Controller task failed: {e}"))
        })?
        .map_err(to_fdo_error)
}

/// Start the DBus server and register all objects for the attached controller.
///
/// Blocks until SIGINT or SIGTERM.
pub async fn run_server(ctl: Arc<ExcaliburController>, info: manager::ManagerInfo) -> Result<()> {
    let channels = SensorChannel::all();
    let sensor_paths: Vec<String> = channels.iter().map(|c| sensor_path(*c)).collect();
    let manager = manager::ExcaliburManager::new(info, sensor_paths.clone());

    let mut builder = Builder::system()?
        .name(BUS_NAME)?
        .serve_at(MANAGER_PATH, manager)?;

    for (channel, path) in channels.into_iter().zip(sensor_paths) {
        builder = builder.serve_at(path, sensor::ExcaliburSensor::new(Arc::clone(&ctl), channel))?;
    }
    builder = builder.serve_at(LED_PATH, led::ExcaliburLed::new(Arc::clone(&ctl)))?;

    let _conn = builder.build().await?;

    info!(
        "DBus server ready on {} ({} sensors, 1 LED)",
        BUS_NAME,
        channels.len()
    );

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        r = tokio::signal::ctrl_c() => r?,
        _ = sigterm.recv() => {}
    }

    info!("Shutdown requested, releasing {}", BUS_NAME);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::FanChannel;
    use crate::driver::TransportError;
    use crate::driver::channel::ChannelError;

    #[test]
    fn test_sensor_paths() {
        assert_eq!(
            sensor_path(SensorChannel::Fan(FanChannel::Cpu)),
            "/org/freedesktop/excalibur1/hwmon/fan1"
        );
        assert_eq!(
            sensor_path(SensorChannel::PowerPlan),
            "/org/freedesktop/excalibur1/hwmon/pwm1"
        );
    }

    #[test]
    fn test_error_mapping() {
        let io = to_fdo_error(ExcaliburError::Io(ChannelError::QueryFailed {
            sub: 0x0300,
            source: TransportError::NoData,
        }));
        match io {
            zbus::fdo::Error::IOError(msg) => assert!(msg.starts_with("EIO: "), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }

        assert!(matches!(
            to_fdo_error(ExcaliburError::InvalidArgument("zone".into())),
            zbus::fdo::Error::InvalidArgs(m) if m.starts_with("EINVAL: ")
        ));
        assert!(matches!(
            to_fdo_error(ExcaliburError::NotSupported("read".into())),
            zbus::fdo::Error::NotSupported(m) if m.starts_with("EOPNOTSUPP: ")
        ));
    }
}
