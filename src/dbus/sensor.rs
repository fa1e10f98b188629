/* DBus Sensor interface: one object per hwmon-style channel (fan1, fan2, pwm1). Every Value read is
 * a fresh firmware exchange; nothing is cached here. */
use std::sync::Arc;

use zbus::interface;

use crate::controller::ExcaliburController;
use crate::dbus::call_blocking;
use crate::sensor::SensorChannel;

/// The `org.freedesktop.excalibur1.Sensor` interface.
pub struct ExcaliburSensor {
    ctl: Arc<ExcaliburController>,
    channel: SensorChannel,
}

impl ExcaliburSensor {
    pub fn new(ctl: Arc<ExcaliburController>, channel: SensorChannel) -> Self {
        Self { ctl, channel }
    }
}

#[interface(name = "org.freedesktop.excalibur1.Sensor")]
impl ExcaliburSensor {
    /// Attribute name, e.g. `fan1` (constant).
    #[zbus(property)]
    fn name(&self) -> String {
        self.channel.name().to_string()
    }

    /// Channel label, empty when the channel has none (constant).
    #[zbus(property)]
    fn label(&self) -> String {
        self.channel.label().unwrap_or_default().to_string()
    }

    #[zbus(property)]
    fn writable(&self) -> bool {
        self.channel.writable()
    }

    /// Permission bits: 0o444 or 0o644 (constant).
    #[zbus(property)]
    fn mode(&self) -> u32 {
        self.channel.mode()
    }

    /// Current value: RPM for fans, the raw plan id for pwm1.
    #[zbus(property(emits_changed_signal = "false"))]
    async fn value(&self) -> zbus::fdo::Result<i64> {
        let channel = self.channel;
        call_blocking(&self.ctl, move |ctl| channel.read(ctl)).await
    }

    #[zbus(property)]
    async fn set_value(&self, value: i64) -> zbus::Result<()> {
        let channel = self.channel;
        call_blocking(&self.ctl, move |ctl| channel.write(ctl, value)).await?;
        Ok(())
    }
}
