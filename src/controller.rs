/* Excalibur controller: the per-device sensor/actuator operations built on the firmware channel,
 * the resolved quirk profile, and the LED shadow state. */
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::device::{
    FanChannel, LedEffect, LedMode, LedShadowState, LedZone, MAX_BRIGHTNESS, PowerPlan, RgbColor,
    find_preset,
};
use crate::driver::channel::FirmwareChannel;
use crate::driver::excalibur::{SUB_BIOS_VERSION, SUB_HARDWARE_INFO, SUB_POWER_PLAN, SUB_SET_LED};
use crate::error::ExcaliburError;
use crate::quirk_database::QuirkProfile;

/* Name of the keyboard backlight device. */
pub const KBD_BACKLIGHT_NAME: &str = "excalibur::kbd_backlight";

/* Apply the fan-speed quirk to the low 16 bits of a register. */
pub fn decode_fan_speed(register: u32, profile: QuirkProfile) -> u16 {
    let raw = register as u16;
    if profile.raw_fan_speed_encoding {
        raw
    } else {
        raw.swap_bytes()
    }
}

/* Split a raw LED control value: upper 32 bits zone, lower 32 bits data word. */
pub fn parse_led_control(input: &str) -> Result<(u32, u32), ExcaliburError> {
    let s = input.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let value = u64::from_str_radix(s, 16)
        .map_err(|e| ExcaliburError::InvalidArgument(format!("'{}': {e}", input.trim())))?;
    Ok(((value >> 32) as u32, value as u32))
}

/* One attached controller.                                          */
/*                                                                   */
/* Lock order is shadow first, then the channel (inside `exchange`). */
/* Fan and power-plan traffic only takes the channel lock.           */
pub struct ExcaliburController {
    channel: FirmwareChannel,
    quirks: QuirkProfile,
    shadow: Mutex<LedShadowState>,
}

impl ExcaliburController {
    pub fn new(channel: FirmwareChannel, quirks: QuirkProfile) -> Self {
        Self {
            channel,
            quirks,
            shadow: Mutex::new(LedShadowState::default()),
        }
    }

    pub fn transport_name(&self) -> String {
        self.channel.transport_name()
    }

    /* Handshake: fetch the firmware version block. Returns a2..a6 uninterpreted. */
    pub fn probe(&self) -> Result<[u32; 5], ExcaliburError> {
        let resp = self.channel.read(SUB_BIOS_VERSION)?;
        let words = [resp.a2, resp.a3, resp.a4, resp.a5, resp.a6];
        debug!("Firmware version block: {words:08x?}");
        Ok(words)
    }

    /* Current fan speed of `channel`. */
    pub fn read_fan_speed(&self, channel: FanChannel) -> Result<u16, ExcaliburError> {
        let resp = self.channel.read(SUB_HARDWARE_INFO)?;
        let register = match channel {
            FanChannel::Cpu => resp.a4,
            FanChannel::Gpu => resp.a5,
        };
        Ok(decode_fan_speed(register, self.quirks))
    }

    /* Active power plan. Unknown values come back as `PowerPlan::Other`. */
    pub fn read_power_plan(&self) -> Result<PowerPlan, ExcaliburError> {
        let resp = self.channel.read(SUB_POWER_PLAN)?;
        Ok(PowerPlan::from_raw(resp.a2))
    }

    pub fn write_power_plan(&self, plan: PowerPlan) -> Result<(), ExcaliburError> {
        self.channel
            .write(SUB_POWER_PLAN, plan.as_raw(), 0)
            .map_err(|e| {
                error!("Failed to set power plan: {e}");
                ExcaliburError::from(e)
            })
    }

    /* Write a zone's data word. Keyboard zones update the shadow on success. */
    pub fn set_led(&self, zone: LedZone, data_word: u32) -> Result<(), ExcaliburError> {
        let mut shadow = self.shadow.lock();
        self.set_led_locked(&mut shadow, zone, data_word)
    }

    fn set_led_locked(
        &self,
        shadow: &mut LedShadowState,
        zone: LedZone,
        data_word: u32,
    ) -> Result<(), ExcaliburError> {
        self.channel
            .write(SUB_SET_LED, zone.as_raw(), data_word)
            .map_err(|e| {
                error!("Failed to set LED zone {:#04x}: {e}", zone.as_raw());
                ExcaliburError::from(e)
            })?;

        if zone.is_keyboard() {
            shadow.record_write(zone, data_word);
        }
        Ok(())
    }

    /* Change only the brightness field of the last keyboard word. */
    pub fn set_keyboard_brightness(&self, level: u32) -> Result<(), ExcaliburError> {
        let level = level.min(MAX_BRIGHTNESS);
        let mut shadow = self.shadow.lock();
        let word = shadow.merge_brightness(level);
        self.set_led_locked(&mut shadow, LedZone::Keyboard1, word)
    }

    /* Brightness from the shadow. Never talks to the firmware. */
    pub fn get_keyboard_brightness(&self) -> u32 {
        self.shadow.lock().current_brightness()
    }

    /* Zone of the last successful keyboard write, if any. */
    pub fn last_keyboard_zone(&self) -> Option<LedZone> {
        self.shadow.lock().last_zone()
    }

    /* Recolor `zone`, keeping the mode and brightness of the last keyboard word. */
    /*                                                                          */
    /* A dark or unrecognized last word becomes a static effect at full level.  */
    pub fn set_color(&self, zone: LedZone, color: RgbColor) -> Result<(), ExcaliburError> {
        let mut shadow = self.shadow.lock();
        let effect = match LedEffect::from_data_word(shadow.last_data_word()) {
            Some(last) if last.mode != LedMode::Off => LedEffect { color, ..last },
            _ => LedEffect::new(LedMode::Static, MAX_BRIGHTNESS, color),
        };
        self.set_led_locked(&mut shadow, zone, effect.to_data_word())
    }

    /* Raw attribute write: 64-bit hex, zone in the upper half. */
    pub fn write_led_control(&self, input: &str) -> Result<(), ExcaliburError> {
        let (raw_zone, data_word) = parse_led_control(input)?;
        let zone = LedZone::from_raw(raw_zone).ok_or_else(|| {
            ExcaliburError::InvalidArgument(format!("unknown LED zone {raw_zone:#x}"))
        })?;
        self.set_led(zone, data_word)
    }

    /* The raw attribute is write-only: the hardware cannot report it. */
    pub fn read_led_control(&self) -> Result<String, ExcaliburError> {
        Err(ExcaliburError::NotSupported(
            "led_control is write-only".to_string(),
        ))
    }

    pub fn set_effect(&self, zone: LedZone, effect: LedEffect) -> Result<(), ExcaliburError> {
        self.set_led(zone, effect.to_data_word())
    }

    /* Apply a named preset to the first keyboard zone. */
    pub fn apply_preset(&self, name: &str) -> Result<(), ExcaliburError> {
        let effect = find_preset(name)
            .ok_or_else(|| ExcaliburError::InvalidArgument(format!("unknown preset '{name}'")))?;
        self.set_effect(LedZone::Keyboard1, effect)
    }
}
