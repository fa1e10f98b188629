/* Excalibur WMI command codec: wire constants, the fixed 32-byte command/response block, and the
 * encode/decode helpers shared by the channel and the simulated controller. */
/*  */
/* Every exchange with the controller uses the same little-endian layout: */
/* `u16 mode, u16 sub, u32 a2, a3, a4, a5, a6, rev0, rev1`               */
/* The two trailing words are reserved and always zero on the wire.       */
use thiserror::Error;

use crate::driver::AcpiObject;

/* WMI block GUID exported by the firmware */
pub const EXCALIBUR_WMI_GUID: &str = "644C5791-B7B0-4123-A90B-E93876E0DAAD";

/* Mode selectors (first 16-bit field) */
pub const MODE_READ: u16 = 0xfa00;
pub const MODE_WRITE: u16 = 0xfb00;

/* Sub-command codes (second 16-bit field) */
pub const SUB_SET_LED: u16 = 0x0100;
pub const SUB_HARDWARE_INFO: u16 = 0x0200;
pub const SUB_BIOS_VERSION: u16 = 0x0201;
pub const SUB_POWER_PLAN: u16 = 0x0300;

/* Total size of a command or response block in bytes. */
pub const BLOCK_SIZE: usize = 32;

/* Offsets of the header fields and the first register. */
const OFFSET_MODE: usize = 0;
const OFFSET_SUB: usize = 2;
const OFFSET_REGISTERS: usize = 4;

/* Number of 32-bit words after the header: a2..a6 plus two reserved words. */
const WORD_COUNT: usize = 7;

/* Failures while interpreting a payload fetched from the controller. */
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Response length mismatch: got {actual} bytes, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Response is not a buffer (got {found})")]
    TypeMismatch { found: &'static str },
}

/* Which half of the protocol a command belongs to. */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandMode {
    Read,
    Write,
}

impl CommandMode {
    pub fn as_raw(self) -> u16 {
        match self {
            CommandMode::Read => MODE_READ,
            CommandMode::Write => MODE_WRITE,
        }
    }

    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            MODE_READ => Some(CommandMode::Read),
            MODE_WRITE => Some(CommandMode::Write),
            _ => None,
        }
    }
}

/* One firmware block. Register meaning depends entirely on `sub`. */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirmwareCommand {
    pub mode: u16,
    pub sub: u16,
    pub a2: u32,
    pub a3: u32,
    pub a4: u32,
    pub a5: u32,
    pub a6: u32,
}

/* The controller echoes the command structure back populated with results. */
pub type FirmwareResponse = FirmwareCommand;

impl FirmwareCommand {
    /* Decoded mode selector, `None` for values the controller invented. */
    pub fn command_mode(&self) -> Option<CommandMode> {
        CommandMode::from_raw(self.mode)
    }

    pub fn is_read(&self) -> bool {
        self.command_mode() == Some(CommandMode::Read)
    }

    /* Serialize to the 32-byte wire image. Reserved words are written as zero. */
    pub fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        let mut b = [0u8; BLOCK_SIZE];
        b[OFFSET_MODE..OFFSET_MODE + 2].copy_from_slice(&self.mode.to_le_bytes());
        b[OFFSET_SUB..OFFSET_SUB + 2].copy_from_slice(&self.sub.to_le_bytes());

        let words = [self.a2, self.a3, self.a4, self.a5, self.a6, 0, 0];
        for (i, word) in words.iter().enumerate() {
            let off = OFFSET_REGISTERS + i * 4;
            b[off..off + 4].copy_from_slice(&word.to_le_bytes());
        }
        b
    }

    /* Parse a raw block. The length must match exactly; partial blocks are rejected. */
    pub fn from_bytes(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() != BLOCK_SIZE {
            return Err(ProtocolError::ShapeMismatch {
                expected: BLOCK_SIZE,
                actual: buf.len(),
            });
        }

        let word = |idx: usize| -> u32 {
            let off = OFFSET_REGISTERS + idx * 4;
            u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
        };

        Ok(Self {
            mode: u16::from_le_bytes([buf[OFFSET_MODE], buf[OFFSET_MODE + 1]]),
            sub: u16::from_le_bytes([buf[OFFSET_SUB], buf[OFFSET_SUB + 1]]),
            a2: word(0),
            a3: word(1),
            a4: word(2),
            a5: word(3),
            a6: word(4),
        })
    }
}

/* Build a WRITE block: `reg0` lands in a2, `reg1` in a3, everything else zero. */
pub fn encode_write(sub: u16, reg0: u32, reg1: u32) -> FirmwareCommand {
    FirmwareCommand {
        mode: CommandMode::Write.as_raw(),
        sub,
        a2: reg0,
        a3: reg1,
        ..FirmwareCommand::default()
    }
}

/* Build a READ selector block with all registers zero. */
pub fn encode_read(sub: u16) -> FirmwareCommand {
    FirmwareCommand {
        mode: CommandMode::Read.as_raw(),
        sub,
        ..FirmwareCommand::default()
    }
}

/* Validate and parse a payload returned by a block query. */
/*  */
/* Only raw buffers carry a response; integers, strings or packages that the */
/* controller returns for unrelated sub-commands are a type mismatch.        */
pub fn decode(payload: &AcpiObject) -> Result<FirmwareResponse, ProtocolError> {
    match payload {
        AcpiObject::Buffer(bytes) => FirmwareCommand::from_bytes(bytes),
        other => Err(ProtocolError::TypeMismatch {
            found: other.kind(),
        }),
    }
}

/* Compile-time check that the header plus the register words fill the block. */
const _: () = assert!(OFFSET_REGISTERS + WORD_COUNT * 4 == BLOCK_SIZE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_write_places_registers() {
        let cmd = encode_write(SUB_SET_LED, 0x03, 0x12ff_ffff);
        assert_eq!(cmd.mode, MODE_WRITE);
        assert_eq!(cmd.sub, SUB_SET_LED);
        assert_eq!(cmd.a2, 0x03);
        assert_eq!(cmd.a3, 0x12ff_ffff);
        assert_eq!((cmd.a4, cmd.a5, cmd.a6), (0, 0, 0));
    }

    #[test]
    fn encode_read_is_all_zero_registers() {
        let cmd = encode_read(SUB_HARDWARE_INFO);
        assert_eq!(cmd.command_mode(), Some(CommandMode::Read));
        assert_eq!(cmd.sub, SUB_HARDWARE_INFO);
        assert_eq!((cmd.a2, cmd.a3, cmd.a4, cmd.a5, cmd.a6), (0, 0, 0, 0, 0));
    }

    #[test]
    fn wire_layout_is_little_endian() {
        let b = encode_write(SUB_POWER_PLAN, 2, 0).to_bytes();
        assert_eq!(&b[0..2], &[0x00, 0xfb]);
        assert_eq!(&b[2..4], &[0x00, 0x03]);
        assert_eq!(&b[4..8], &[0x02, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn reserved_words_are_zero_on_the_wire() {
        let cmd = FirmwareCommand {
            mode: MODE_WRITE,
            sub: 0xffff,
            a2: u32::MAX,
            a3: u32::MAX,
            a4: u32::MAX,
            a5: u32::MAX,
            a6: u32::MAX,
        };
        let b = cmd.to_bytes();
        assert!(b[24..32].iter().all(|&x| x == 0));
        assert!(b[4..24].iter().all(|&x| x == 0xff));
    }

    #[test]
    fn decode_buffer() {
        let mut b = encode_read(SUB_HARDWARE_INFO).to_bytes();
        /* a4 = 0x1234, a5 = 0x0bb8 */
        b[12..16].copy_from_slice(&0x1234u32.to_le_bytes());
        b[16..20].copy_from_slice(&0x0bb8u32.to_le_bytes());

        let resp = decode(&AcpiObject::Buffer(b.to_vec())).expect("valid block");
        assert_eq!(resp.sub, SUB_HARDWARE_INFO);
        assert_eq!(resp.a4, 0x1234);
        assert_eq!(resp.a5, 0x0bb8);
    }

    #[test]
    fn decode_rejects_wrong_lengths() {
        for len in [0, BLOCK_SIZE - 1, BLOCK_SIZE + 1] {
            let err = decode(&AcpiObject::Buffer(vec![0u8; len])).unwrap_err();
            assert_eq!(
                err,
                ProtocolError::ShapeMismatch {
                    expected: BLOCK_SIZE,
                    actual: len
                }
            );
        }
    }

    #[test]
    fn decode_rejects_non_buffers() {
        let err = decode(&AcpiObject::String("ok".into())).unwrap_err();
        assert_eq!(err, ProtocolError::TypeMismatch { found: "string" });

        let err = decode(&AcpiObject::Integer(1)).unwrap_err();
        assert_eq!(err, ProtocolError::TypeMismatch { found: "integer" });

        let err = decode(&AcpiObject::Package(vec![])).unwrap_err();
        assert_eq!(err, ProtocolError::TypeMismatch { found: "package" });
    }

    #[test]
    fn register_contents_are_opaque() {
        /* An unknown mode and sub-command still decode; interpretation is not the codec's job. */
        let mut b = [0u8; BLOCK_SIZE];
        b[0] = 0x34;
        b[1] = 0x12;
        let resp = FirmwareCommand::from_bytes(&b).expect("opaque block");
        assert_eq!(resp.mode, 0x1234);
        assert_eq!(resp.command_mode(), None);
    }
}
