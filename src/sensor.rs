/* Sensor channels exposed by the daemon: the two fan tachometers and the power-plan control,
 * each described by a fixed table of name, label, and access mode. */
use crate::controller::ExcaliburController;
use crate::device::{FanChannel, PowerPlan};
use crate::error::ExcaliburError;

/* hwmon-style permission bits. */
pub const MODE_READ_ONLY: u32 = 0o444;
pub const MODE_READ_WRITE: u32 = 0o644;

/// One readable (and possibly writable) sensor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorChannel {
    Fan(FanChannel),
    PowerPlan,
}

impl SensorChannel {
    /// Every channel, in registration order.
    pub fn all() -> [SensorChannel; 3] {
        [
            SensorChannel::Fan(FanChannel::Cpu),
            SensorChannel::Fan(FanChannel::Gpu),
            SensorChannel::PowerPlan,
        ]
    }

    /// Attribute name, used as the last object path segment.
    pub fn name(self) -> &'static str {
        match self {
            SensorChannel::Fan(FanChannel::Cpu) => "fan1",
            SensorChannel::Fan(FanChannel::Gpu) => "fan2",
            SensorChannel::PowerPlan => "pwm1",
        }
    }

    /// Human-readable label. The power-plan channel has none.
    pub fn label(self) -> Option<&'static str> {
        match self {
            SensorChannel::Fan(fan) => Some(fan.label()),
            SensorChannel::PowerPlan => None,
        }
    }

    pub fn writable(self) -> bool {
        matches!(self, SensorChannel::PowerPlan)
    }

    pub fn mode(self) -> u32 {
        if self.writable() {
            MODE_READ_WRITE
        } else {
            MODE_READ_ONLY
        }
    }

    /// Read the current value. Every call is a fresh firmware exchange.
    pub fn read(self, ctl: &ExcaliburController) -> Result<i64, ExcaliburError> {
        match self {
            SensorChannel::Fan(fan) => ctl.read_fan_speed(fan).map(i64::from),
            SensorChannel::PowerPlan => ctl.read_power_plan().map(|p| i64::from(p.as_raw())),
        }
    }

    /// Write a value. Only the power-plan channel accepts writes.
    pub fn write(self, ctl: &ExcaliburController, value: i64) -> Result<(), ExcaliburError> {
        match self {
            SensorChannel::Fan(_) => Err(ExcaliburError::NotSupported(format!(
                "{} is read-only",
                self.name()
            ))),
            SensorChannel::PowerPlan => {
                let raw = u32::try_from(value).map_err(|_| {
                    ExcaliburError::InvalidArgument(format!("power plan {value} out of range"))
                })?;
                ctl.write_power_plan(PowerPlan::from_raw(raw))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::channel::FirmwareChannel;
    use crate::quirk_database::QuirkProfile;
    use crate::test_device::SimulatedController;

    fn controller() -> (ExcaliburController, SimulatedController) {
        let sim = SimulatedController::default();
        let ctl = ExcaliburController::new(
            FirmwareChannel::new(Box::new(sim.clone())),
            QuirkProfile::default(),
        );
        (ctl, sim)
    }

    #[test]
    fn test_channel_table() {
        let names: Vec<_> = SensorChannel::all().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["fan1", "fan2", "pwm1"]);

        let fan1 = SensorChannel::Fan(FanChannel::Cpu);
        assert_eq!(fan1.label(), Some("cpu_fan_speed"));
        assert_eq!(fan1.mode(), 0o444);
        assert!(!fan1.writable());

        assert_eq!(SensorChannel::PowerPlan.label(), None);
        assert_eq!(SensorChannel::PowerPlan.mode(), 0o644);
    }

    #[test]
    fn test_read_values() {
        let (ctl, _sim) = controller();
        assert_eq!(SensorChannel::Fan(FanChannel::Cpu).read(&ctl).unwrap(), 2400);
        assert_eq!(SensorChannel::Fan(FanChannel::Gpu).read(&ctl).unwrap(), 3100);
        assert_eq!(SensorChannel::PowerPlan.read(&ctl).unwrap(), 2);
    }

    #[test]
    fn test_write_power_plan() {
        let (ctl, sim) = controller();
        SensorChannel::PowerPlan.write(&ctl, 1).unwrap();
        assert_eq!(sim.power_plan(), 1);
        assert_eq!(SensorChannel::PowerPlan.read(&ctl).unwrap(), 1);
    }

    #[test]
    fn test_write_rejections() {
        let (ctl, sim) = controller();
        assert!(matches!(
            SensorChannel::Fan(FanChannel::Gpu).write(&ctl, 1000),
            Err(ExcaliburError::NotSupported(_))
        ));
        assert!(matches!(
            SensorChannel::PowerPlan.write(&ctl, -1),
            Err(ExcaliburError::InvalidArgument(_))
        ));
        assert!(matches!(
            SensorChannel::PowerPlan.write(&ctl, i64::from(u32::MAX) + 1),
            Err(ExcaliburError::InvalidArgument(_))
        ));
        assert!(sim.submitted().is_empty());
    }
}
