/* DBus LED interface: the keyboard backlight as a single LED object with brightness backed by the
 * shadow state, methods for the raw write-only control value, colors, effects and presets. */
use std::sync::Arc;

use zbus::interface;

use crate::controller::{ExcaliburController, KBD_BACKLIGHT_NAME};
use crate::dbus::call_blocking;
use crate::device::{LED_PRESETS, LedEffect, LedMode, LedZone, MAX_BRIGHTNESS, RgbColor};
use crate::error::ExcaliburError;

/// The `org.freedesktop.excalibur1.Led` interface.
///
/// Brightness reads come from the controller's shadow state; the firmware
/// cannot report the active lighting pattern.
pub struct ExcaliburLed {
    ctl: Arc<ExcaliburController>,
}

impl ExcaliburLed {
    pub fn new(ctl: Arc<ExcaliburController>) -> Self {
        Self { ctl }
    }
}

/// Convert a DBus RGB tuple `(u32, u32, u32)` into an [`RgbColor`], clamping to 255.
#[inline]
fn color_from_tuple(t: (u32, u32, u32)) -> RgbColor {
    RgbColor::new(t.0.min(255) as u8, t.1.min(255) as u8, t.2.min(255) as u8)
}

fn zone_from_arg(zone: u32) -> Result<LedZone, ExcaliburError> {
    LedZone::from_raw(zone)
        .ok_or_else(|| ExcaliburError::InvalidArgument(format!("unknown LED zone {zone:#x}")))
}

/* Parse a `rrggbb` / `#rrggbb` color argument. */
fn color_from_hex_arg(color: &str) -> Result<RgbColor, ExcaliburError> {
    RgbColor::from_hex(color)
        .ok_or_else(|| ExcaliburError::InvalidArgument(format!("invalid color '{color}'")))
}

/* Validate the raw arguments of SetEffect. */
fn effect_from_args(
    zone: u32,
    mode: u32,
    brightness: u32,
    color: (u32, u32, u32),
) -> Result<(LedZone, LedEffect), ExcaliburError> {
    let zone = zone_from_arg(zone)?;
    let mode = LedMode::from_u32(mode)
        .ok_or_else(|| ExcaliburError::InvalidArgument(format!("invalid LED mode {mode}")))?;
    Ok((zone, LedEffect::new(mode, brightness, color_from_tuple(color))))
}

#[interface(name = "org.freedesktop.excalibur1.Led")]
impl ExcaliburLed {
    /// LED class device name (constant).
    #[zbus(property)]
    fn name(&self) -> String {
        KBD_BACKLIGHT_NAME.to_string()
    }

    #[zbus(property)]
    fn max_brightness(&self) -> u32 {
        MAX_BRIGHTNESS
    }

    /// Backlight level 0-2 (read-write). Writes keep the current color and mode.
    #[zbus(property)]
    async fn brightness(&self) -> zbus::fdo::Result<u32> {
        call_blocking(&self.ctl, |ctl| Ok(ctl.get_keyboard_brightness())).await
    }

    #[zbus(property)]
    async fn set_brightness(&self, brightness: u32) -> zbus::Result<()> {
        call_blocking(&self.ctl, move |ctl| ctl.set_keyboard_brightness(brightness)).await?;
        Ok(())
    }

    /// Zone of the last keyboard write, 0 before any write.
    #[zbus(property(emits_changed_signal = "false"))]
    async fn last_zone(&self) -> zbus::fdo::Result<u32> {
        call_blocking(&self.ctl, |ctl| {
            Ok(ctl.last_keyboard_zone().map(LedZone::as_raw).unwrap_or(0))
        })
        .await
    }

    /// Write a raw zone/data control value: 64-bit hex, zone in the upper half.
    async fn set_led_control(&self, value: String) -> zbus::fdo::Result<()> {
        call_blocking(&self.ctl, move |ctl| ctl.write_led_control(&value)).await
    }

    /// The control value is write-only; this always fails with NotSupported.
    async fn get_led_control(&self) -> zbus::fdo::Result<String> {
        call_blocking(&self.ctl, |ctl| ctl.read_led_control()).await
    }

    /// Recolor one zone, keeping the current mode and brightness.
    async fn set_color(&self, zone: u32, color: String) -> zbus::fdo::Result<()> {
        call_blocking(&self.ctl, move |ctl| {
            let zone = zone_from_arg(zone)?;
            ctl.set_color(zone, color_from_hex_arg(&color)?)
        })
        .await
    }

    /// Names accepted by `ApplyPreset` (constant).
    #[zbus(property)]
    fn presets(&self) -> Vec<String> {
        LED_PRESETS
            .iter()
            .map(|(name, _)| (*name).to_string())
            .collect()
    }

    /// Write a complete effect to one zone.
    async fn set_effect(
        &self,
        zone: u32,
        mode: u32,
        brightness: u32,
        color: (u32, u32, u32),
    ) -> zbus::fdo::Result<()> {
        call_blocking(&self.ctl, move |ctl| {
            let (zone, effect) = effect_from_args(zone, mode, brightness, color)?;
            ctl.set_effect(zone, effect)
        })
        .await
    }

    /// Apply a named preset to the first keyboard zone.
    async fn apply_preset(&self, name: String) -> zbus::fdo::Result<()> {
        call_blocking(&self.ctl, move |ctl| ctl.apply_preset(&name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_from_tuple_clamps() {
        assert_eq!(
            color_from_tuple((300, 128, 0)),
            RgbColor::new(255, 128, 0)
        );
    }

    #[test]
    fn test_color_from_hex_arg() {
        assert_eq!(
            color_from_hex_arg("#00ff80").unwrap(),
            RgbColor::new(0, 0xff, 0x80)
        );
        assert!(matches!(
            color_from_hex_arg("green"),
            Err(ExcaliburError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_zone_from_arg() {
        assert_eq!(zone_from_arg(0x06).unwrap(), LedZone::AllKeyboard);
        assert!(zone_from_arg(0).is_err());
    }

    #[test]
    fn test_effect_from_args() {
        let (zone, effect) = effect_from_args(0x07, 3, 1, (0x80, 0, 0xff)).unwrap();
        assert_eq!(zone, LedZone::Edge);
        assert_eq!(effect.to_data_word(), 0x3180_00ff);

        assert!(matches!(
            effect_from_args(0x02, 1, 2, (0, 0, 0)),
            Err(ExcaliburError::InvalidArgument(_))
        ));
        assert!(matches!(
            effect_from_args(0x03, 8, 2, (0, 0, 0)),
            Err(ExcaliburError::InvalidArgument(_))
        ));
    }
}
