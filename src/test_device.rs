/* Simulated Excalibur controller: a WmiTransport that behaves like the firmware's single register
 * window, used by unit tests and, with the dev-hooks feature, loadable from a JSON description. */
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;

use crate::driver::excalibur::{
    FirmwareCommand, MODE_READ, MODE_WRITE, SUB_BIOS_VERSION, SUB_HARDWARE_INFO, SUB_POWER_PLAN,
    SUB_SET_LED,
};
use crate::driver::{AcpiObject, TransportError, WmiTransport};

/* ------------------------------------------------------------------ */
/* JSON DTO                                                             */
/* ------------------------------------------------------------------ */

/// JSON description of a simulated laptop.
///
/// An empty string `""` produces a sane default device.
#[derive(Debug, Clone, Deserialize)]
pub struct TestDeviceSpec {
    #[serde(default = "default_vendor")]
    pub vendor: String,
    #[serde(default = "default_product")]
    pub product: String,
    #[serde(default)]
    pub bios_version: Option<String>,
    #[serde(default = "default_cpu_fan")]
    pub cpu_fan_rpm: u16,
    #[serde(default = "default_gpu_fan")]
    pub gpu_fan_rpm: u16,
    /// Report fan speeds with their two bytes swapped, like the G-series firmware.
    #[serde(default)]
    pub swapped_fan_encoding: bool,
    #[serde(default = "default_power_plan")]
    pub power_plan: u32,
    #[serde(default)]
    pub firmware_words: [u32; 5],
}

fn default_vendor() -> String {
    "Simulated Vendor".to_string()
}
fn default_product() -> String {
    "Simulated Excalibur".to_string()
}
fn default_cpu_fan() -> u16 {
    2400
}
fn default_gpu_fan() -> u16 {
    3100
}
fn default_power_plan() -> u32 {
    2
}

impl Default for TestDeviceSpec {
    fn default() -> Self {
        Self {
            vendor: default_vendor(),
            product: default_product(),
            bios_version: None,
            cpu_fan_rpm: default_cpu_fan(),
            gpu_fan_rpm: default_gpu_fan(),
            swapped_fan_encoding: false,
            power_plan: default_power_plan(),
            firmware_words: [0; 5],
        }
    }
}

/* Parse a device description. Blank input yields the default device. */
pub fn parse_json(json: &str) -> Result<TestDeviceSpec, serde_json::Error> {
    if json.trim().is_empty() {
        return Ok(TestDeviceSpec::default());
    }
    serde_json::from_str(json)
}

/* ------------------------------------------------------------------ */
/* Simulated firmware                                                   */
/* ------------------------------------------------------------------ */

/* How the next block queries answer. Only tests override the window. */
#[derive(Debug, Clone)]
#[cfg_attr(not(test), allow(dead_code))]
enum Reply {
    Window,
    Fixed(AcpiObject),
    Nothing,
}

#[derive(Debug)]
struct SimState {
    spec: TestDeviceSpec,
    /* Last block placed in the register window. */
    window: Option<FirmwareCommand>,
    submitted: Vec<FirmwareCommand>,
    #[cfg_attr(not(test), allow(dead_code))]
    queries: usize,
    /* Block instance addressed by the last call. */
    #[cfg_attr(not(test), allow(dead_code))]
    instance: Option<u8>,
    fail_submit: bool,
    reply: Reply,
}

/* Cloning shares the simulated firmware, so tests can inspect it after */
/* handing a clone to the channel.                                      */
#[derive(Clone)]
pub struct SimulatedController {
    state: Arc<Mutex<SimState>>,
}

#[cfg(test)]
impl Default for SimulatedController {
    fn default() -> Self {
        Self::new(TestDeviceSpec::default())
    }
}

impl SimulatedController {
    pub fn new(spec: TestDeviceSpec) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                spec,
                window: None,
                submitted: Vec::new(),
                queries: 0,
                instance: None,
                fail_submit: false,
                reply: Reply::Window,
            })),
        }
    }

    /* Load a description from a JSON file. */
    #[cfg(feature = "dev-hooks")]
    pub fn from_json_file(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read test device {}", path.display()))?;
        let spec = parse_json(&json)
            .with_context(|| format!("Invalid test device JSON in {}", path.display()))?;
        Ok(Self::new(spec))
    }

    pub fn spec(&self) -> TestDeviceSpec {
        self.state.lock().spec.clone()
    }
}

/* Inspection and fault injection for unit tests. */
#[cfg(test)]
impl SimulatedController {
    /* Every block handed to `set_block`, in order. */
    pub fn submitted(&self) -> Vec<FirmwareCommand> {
        self.state.lock().submitted.clone()
    }

    /* (zone, data word) pairs of every LED write received. */
    pub fn led_writes(&self) -> Vec<(u32, u32)> {
        self.state
            .lock()
            .submitted
            .iter()
            .filter(|c| c.mode == MODE_WRITE && c.sub == SUB_SET_LED)
            .map(|c| (c.a2, c.a3))
            .collect()
    }

    pub fn query_count(&self) -> usize {
        self.state.lock().queries
    }

    pub fn last_instance(&self) -> Option<u8> {
        self.state.lock().instance
    }

    pub fn power_plan(&self) -> u32 {
        self.state.lock().spec.power_plan
    }

    pub fn set_fail_submit(&self, fail: bool) {
        self.state.lock().fail_submit = fail;
    }

    /* Answer every following query with `obj`. */
    pub fn set_reply(&self, obj: AcpiObject) {
        self.state.lock().reply = Reply::Fixed(obj);
    }

    /* Answer every following query with no object. */
    pub fn set_no_reply(&self) {
        self.state.lock().reply = Reply::Nothing;
    }

    pub fn set_fan_rpm(&self, cpu: u16, gpu: u16) {
        let mut state = self.state.lock();
        state.spec.cpu_fan_rpm = cpu;
        state.spec.gpu_fan_rpm = gpu;
    }
}

impl SimState {
    /* The populated block the firmware exposes after a READ selector. */
    fn populate(&self, sub: u16) -> FirmwareCommand {
        let mut block = FirmwareCommand {
            mode: MODE_READ,
            sub,
            ..FirmwareCommand::default()
        };
        let fan = |rpm: u16| {
            if self.spec.swapped_fan_encoding {
                u32::from(rpm.swap_bytes())
            } else {
                u32::from(rpm)
            }
        };

        match sub {
            SUB_HARDWARE_INFO => {
                block.a4 = fan(self.spec.cpu_fan_rpm);
                block.a5 = fan(self.spec.gpu_fan_rpm);
            }
            SUB_POWER_PLAN => block.a2 = self.spec.power_plan,
            SUB_BIOS_VERSION => {
                let w = self.spec.firmware_words;
                block.a2 = w[0];
                block.a3 = w[1];
                block.a4 = w[2];
                block.a5 = w[3];
                block.a6 = w[4];
            }
            _ => {}
        }
        block
    }
}

impl WmiTransport for SimulatedController {
    fn name(&self) -> &str {
        "simulated"
    }

    fn set_block(&self, instance: u8, input: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.instance = Some(instance);
        if state.fail_submit {
            return Err(TransportError::Acpi("AE_ERROR".to_string()));
        }

        let cmd = FirmwareCommand::from_bytes(input)
            .map_err(|e| TransportError::Reply(e.to_string()))?;
        state.submitted.push(cmd);

        if cmd.mode == MODE_READ {
            let block = state.populate(cmd.sub);
            state.window = Some(block);
        } else {
            if cmd.sub == SUB_POWER_PLAN {
                state.spec.power_plan = cmd.a2;
            }
            state.window = Some(cmd);
        }
        Ok(())
    }

    fn query_block(&self, instance: u8) -> Result<Option<AcpiObject>, TransportError> {
        let mut state = self.state.lock();
        state.instance = Some(instance);
        state.queries += 1;

        Ok(match &state.reply {
            Reply::Fixed(obj) => Some(obj.clone()),
            Reply::Nothing => None,
            Reply::Window => state
                .window
                .map(|block| AcpiObject::Buffer(block.to_bytes().to_vec())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_empty_is_default() {
        let spec = parse_json("").unwrap();
        assert_eq!(spec.cpu_fan_rpm, 2400);
        assert_eq!(spec.power_plan, 2);
        assert!(!spec.swapped_fan_encoding);
    }

    #[test]
    fn test_parse_json_fields() {
        let spec = parse_json(
            r#"{"vendor": "EXCALIBUR BILGISAYAR SISTEMLERI", "product": "EXCALIBUR G900",
                "bios_version": "CP131", "cpu_fan_rpm": 4096, "swapped_fan_encoding": true,
                "firmware_words": [1, 2, 3, 4, 5]}"#,
        )
        .unwrap();
        assert_eq!(spec.product, "EXCALIBUR G900");
        assert_eq!(spec.bios_version.as_deref(), Some("CP131"));
        assert_eq!(spec.cpu_fan_rpm, 4096);
        assert_eq!(spec.gpu_fan_rpm, 3100);
        assert!(spec.swapped_fan_encoding);
        assert_eq!(spec.firmware_words, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_power_plan_write_updates_device() {
        let sim = SimulatedController::default();
        let handle = sim.clone();
        let write = crate::driver::excalibur::encode_write(SUB_POWER_PLAN, 4, 0);
        sim.set_block(0, &write.to_bytes()).unwrap();

        assert_eq!(handle.spec().power_plan, 4);
        assert_eq!(handle.spec().product, "Simulated Excalibur");
    }

    #[test]
    fn test_parse_json_invalid() {
        assert!(parse_json("{not json").is_err());
    }

    #[test]
    fn test_window_echoes_writes() {
        let sim = SimulatedController::default();
        let write = crate::driver::excalibur::encode_write(0x0100, 0x07, 0xdead_beef);
        sim.set_block(0, &write.to_bytes()).unwrap();

        let obj = sim.query_block(0).unwrap().unwrap();
        assert_eq!(obj, AcpiObject::Buffer(write.to_bytes().to_vec()));
    }

    #[test]
    fn test_query_before_any_submit_is_empty() {
        let sim = SimulatedController::default();
        assert_eq!(sim.query_block(0).unwrap(), None);
        assert_eq!(sim.query_count(), 1);
    }
}
