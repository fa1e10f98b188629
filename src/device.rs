/* Canonical device vocabulary shared by the controller, sensors and DBus objects: LED zones, power
 * plans, fan channels, keyboard effect words, and the write-only LED shadow state. */

/* Brightness field of a keyboard data word (bits 24..27). */
pub const BRIGHTNESS_SHIFT: u32 = 24;
pub const BRIGHTNESS_MASK: u32 = 0x0F00_0000;

/* Highest keyboard backlight level the firmware accepts. */
pub const MAX_BRIGHTNESS: u32 = 2;

/* Effect mode field of a keyboard data word (bits 28..31). */
const MODE_SHIFT: u32 = 28;

/// Addressable LED groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum LedZone {
    Keyboard1 = 0x03,
    Keyboard2 = 0x04,
    Keyboard3 = 0x05,
    AllKeyboard = 0x06,
    /// Edge/corner strip. Writes to it are never shadowed.
    Edge = 0x07,
}

impl LedZone {
    /// Convert a raw zone identifier. Unknown identifiers yield `None`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x03 => Some(Self::Keyboard1),
            0x04 => Some(Self::Keyboard2),
            0x05 => Some(Self::Keyboard3),
            0x06 => Some(Self::AllKeyboard),
            0x07 => Some(Self::Edge),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /* Keyboard zones feed the backlight shadow; the edge strip does not. */
    pub fn is_keyboard(self) -> bool {
        self != Self::Edge
    }
}

/// Performance/power modes carried in register a2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerPlan {
    HighPower,
    Gaming,
    TextMode,
    LowPower,
    /// A value the firmware reported that has no known name. Passed through untouched.
    Other(u32),
}

impl PowerPlan {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::HighPower,
            2 => Self::Gaming,
            3 => Self::TextMode,
            4 => Self::LowPower,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            Self::HighPower => 1,
            Self::Gaming => 2,
            Self::TextMode => 3,
            Self::LowPower => 4,
            Self::Other(raw) => raw,
        }
    }
}

/// Fan tachometer channels reported by the hardware-info block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanChannel {
    Cpu,
    Gpu,
}

impl FanChannel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Cpu => "cpu_fan_speed",
            Self::Gpu => "gpu_fan_speed",
        }
    }
}

/* Compact RGB color used for keyboard effect words. */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /* Parse a six digit hex string such as `8000ff` (an optional `#` is accepted). */
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches('#');
        if s.len() != 6 {
            return None;
        }
        let v = u32::from_str_radix(s, 16).ok()?;
        Some(Self::from_u24(v))
    }

    fn from_u24(v: u32) -> Self {
        Self {
            r: (v >> 16) as u8,
            g: (v >> 8) as u8,
            b: v as u8,
        }
    }

    fn as_u24(self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }
}

/* Keyboard lighting effects understood by the firmware. */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LedMode {
    Off = 0,
    Static = 1,
    Blinking = 2,
    Breathing = 3,
    Pulsing = 4,
    RainbowPulsing = 5,
    RainbowPulsingAlt = 6,
    RainbowWave = 7,
}

impl LedMode {
    /* Convert a raw mode nibble into a LedMode. */
    pub fn from_u32(val: u32) -> Option<LedMode> {
        match val {
            0 => Some(LedMode::Off),
            1 => Some(LedMode::Static),
            2 => Some(LedMode::Blinking),
            3 => Some(LedMode::Breathing),
            4 => Some(LedMode::Pulsing),
            5 => Some(LedMode::RainbowPulsing),
            6 => Some(LedMode::RainbowPulsingAlt),
            7 => Some(LedMode::RainbowWave),
            _ => None,
        }
    }
}

/* A complete keyboard lighting state: `mode << 28 | brightness << 24 | rgb`. */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedEffect {
    pub mode: LedMode,
    pub brightness: u32,
    pub color: RgbColor,
}

impl LedEffect {
    pub const fn new(mode: LedMode, brightness: u32, color: RgbColor) -> Self {
        Self {
            mode,
            brightness,
            color,
        }
    }

    /* Pack into the 32-bit data word. Brightness is clamped to the firmware maximum. */
    pub fn to_data_word(self) -> u32 {
        ((self.mode as u32) << MODE_SHIFT)
            | (self.brightness.min(MAX_BRIGHTNESS) << BRIGHTNESS_SHIFT)
            | self.color.as_u24()
    }

    /* Unpack a data word. Returns `None` when the mode nibble is unknown. */
    pub fn from_data_word(word: u32) -> Option<Self> {
        Some(Self {
            mode: LedMode::from_u32(word >> MODE_SHIFT)?,
            brightness: (word & BRIGHTNESS_MASK) >> BRIGHTNESS_SHIFT,
            color: RgbColor::from_u24(word & 0x00FF_FFFF),
        })
    }
}

const WHITE: RgbColor = RgbColor::new(0xff, 0xff, 0xff);

/* Named keyboard effects, applied to the first keyboard zone. */
pub const LED_PRESETS: &[(&str, LedEffect)] = &[
    ("off", LedEffect::new(LedMode::Off, 0, RgbColor::new(0, 0, 0))),
    ("default_static", LedEffect::new(LedMode::Static, 2, WHITE)),
    ("default_blinking", LedEffect::new(LedMode::Blinking, 2, WHITE)),
    ("default_breathing", LedEffect::new(LedMode::Breathing, 2, WHITE)),
    ("default_pulsing", LedEffect::new(LedMode::Pulsing, 2, WHITE)),
    ("rainbow_pulsing", LedEffect::new(LedMode::RainbowPulsing, 2, WHITE)),
    ("rainbow_pulsing_alt", LedEffect::new(LedMode::RainbowPulsingAlt, 2, WHITE)),
    ("rainbow_wave", LedEffect::new(LedMode::RainbowWave, 2, WHITE)),
    ("gaming_red", LedEffect::new(LedMode::Static, 2, RgbColor::new(0xff, 0, 0))),
    ("gaming_blue", LedEffect::new(LedMode::Static, 2, RgbColor::new(0, 0, 0xff))),
    ("cyber_purple", LedEffect::new(LedMode::Breathing, 2, RgbColor::new(0x80, 0, 0xff))),
    ("hacker_green", LedEffect::new(LedMode::Blinking, 1, RgbColor::new(0, 0xff, 0))),
];

/* Look up a preset by name. */
pub fn find_preset(name: &str) -> Option<LedEffect> {
    LED_PRESETS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, effect)| *effect)
}

/* Host-side record of the last keyboard LED command.                */
/*                                                                   */
/* The controller never reports the active pattern, so brightness    */
/* readback and brightness-only updates are derived from this value. */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedShadowState {
    last_zone: Option<LedZone>,
    last_data_word: u32,
}

impl LedShadowState {
    /* Store the last successful keyboard write. */
    pub fn record_write(&mut self, zone: LedZone, data_word: u32) {
        self.last_zone = Some(zone);
        self.last_data_word = data_word;
    }

    pub fn last_zone(&self) -> Option<LedZone> {
        self.last_zone
    }

    pub fn last_data_word(&self) -> u32 {
        self.last_data_word
    }

    /* Brightness of the last written word, 0 before any write. */
    pub fn current_brightness(&self) -> u32 {
        ((self.last_data_word & BRIGHTNESS_MASK) >> BRIGHTNESS_SHIFT).min(MAX_BRIGHTNESS)
    }

    /* The last word with only its brightness field replaced. */
    pub fn merge_brightness(&self, level: u32) -> u32 {
        let level = level.min(MAX_BRIGHTNESS);
        (self.last_data_word & !BRIGHTNESS_MASK) | (level << BRIGHTNESS_SHIFT)
    }
}
