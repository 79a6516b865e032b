use byteorder::{ByteOrder, LittleEndian};

use crate::ds18x20::Family;

/// Scratchpad length shared by both thermometer families.
pub const SCRATCHPAD_LEN: usize = 9;

/// Resolution field of the family-28 config register (bits 5..=6).
pub(crate) const CONFIG_RES_MASK: u8 = 0x60;

/// Conversion resolution. Family 10 parts are fixed-function and treated as
/// the 9-bit equivalent; family 28 parts are configurable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Resolution {
    #[default]
    Bits9 = 0,
    Bits10 = 1,
    Bits11 = 2,
    Bits12 = 3,
}

impl Resolution {
    /// Offset above the 9 baseline significant bits.
    pub const fn offset(self) -> u8 {
        self as u8
    }

    /// Worst-case conversion time at this resolution, in milliseconds.
    pub const fn conversion_time_ms(self) -> u16 {
        match self {
            Resolution::Bits9 => 94,
            Resolution::Bits10 => 188,
            Resolution::Bits11 => 375,
            Resolution::Bits12 => 750,
        }
    }

    pub const fn from_config(config: u8) -> Self {
        match (config & CONFIG_RES_MASK) >> 5 {
            0 => Resolution::Bits9,
            1 => Resolution::Bits10,
            2 => Resolution::Bits11,
            _ => Resolution::Bits12,
        }
    }

    /// Rewrite the resolution field of a config register byte.
    pub const fn into_config(self, config: u8) -> u8 {
        (config & !CONFIG_RES_MASK) | ((self as u8) << 5)
    }
}

/// Decoded scratchpad contents, tagged by family. Built positionally from the
/// verified byte buffer, never by reinterpreting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FamilyState {
    Family10 {
        hi_threshold: u8,
        lo_threshold: u8,
        reserved: [u8; 2],
        count_remain: u8,
        count_per_c: u8,
        crc: u8,
    },
    Family28 {
        hi_threshold: u8,
        lo_threshold: u8,
        config: u8,
        reserved: [u8; 3],
        crc: u8,
    },
}

impl FamilyState {
    pub(crate) const fn empty(family: Family) -> Self {
        match family {
            Family::Fam10 => FamilyState::Family10 {
                hi_threshold: 0,
                lo_threshold: 0,
                reserved: [0; 2],
                count_remain: 0,
                count_per_c: 0,
                crc: 0,
            },
            Family::Fam28 => FamilyState::Family28 {
                hi_threshold: 0,
                lo_threshold: 0,
                config: 0,
                reserved: [0; 3],
                crc: 0,
            },
        }
    }

    pub(crate) fn decode(family: Family, buf: &[u8; SCRATCHPAD_LEN]) -> Self {
        match family {
            Family::Fam10 => FamilyState::Family10 {
                hi_threshold: buf[2],
                lo_threshold: buf[3],
                reserved: [buf[4], buf[5]],
                count_remain: buf[6],
                count_per_c: buf[7],
                crc: buf[8],
            },
            Family::Fam28 => FamilyState::Family28 {
                hi_threshold: buf[2],
                lo_threshold: buf[3],
                config: buf[4],
                reserved: [buf[5], buf[6], buf[7]],
                crc: buf[8],
            },
        }
    }

    pub const fn family(&self) -> Family {
        match self {
            FamilyState::Family10 { .. } => Family::Fam10,
            FamilyState::Family28 { .. } => Family::Fam28,
        }
    }

    /// Alarm thresholds as `(hi, lo)`.
    pub const fn thresholds(&self) -> (u8, u8) {
        match *self {
            FamilyState::Family10 {
                hi_threshold,
                lo_threshold,
                ..
            }
            | FamilyState::Family28 {
                hi_threshold,
                lo_threshold,
                ..
            } => (hi_threshold, lo_threshold),
        }
    }

    pub(crate) fn set_thresholds(&mut self, hi: u8, lo: u8) {
        match self {
            FamilyState::Family10 {
                hi_threshold,
                lo_threshold,
                ..
            }
            | FamilyState::Family28 {
                hi_threshold,
                lo_threshold,
                ..
            } => {
                *hi_threshold = hi;
                *lo_threshold = lo;
            }
        }
    }

    /// Config register byte, present on family 28 only.
    pub const fn config(&self) -> Option<u8> {
        match *self {
            FamilyState::Family28 { config, .. } => Some(config),
            FamilyState::Family10 { .. } => None,
        }
    }

    pub(crate) fn set_config(&mut self, value: u8) {
        if let FamilyState::Family28 { config, .. } = self {
            *config = value;
        }
    }

    /// Stage the bytes a scratchpad write sends: Thi, Tlo and, for family 28,
    /// the config register. Returns the payload length.
    pub(crate) fn write_payload(&self, out: &mut [u8; 3]) -> usize {
        match *self {
            FamilyState::Family10 {
                hi_threshold,
                lo_threshold,
                ..
            } => {
                out[0] = hi_threshold;
                out[1] = lo_threshold;
                2
            }
            FamilyState::Family28 {
                hi_threshold,
                lo_threshold,
                config,
                ..
            } => {
                out[0] = hi_threshold;
                out[1] = lo_threshold;
                out[2] = config;
                3
            }
        }
    }
}

/// Sign-extend `raw` as a two's-complement value of `bits` significant bits.
pub(crate) fn sign_extend(raw: u16, bits: u8) -> i32 {
    let shift = 32 - bits as u32;
    (((raw as u32) << shift) as i32) >> shift
}

/// Decode the conversion result held in the first two scratchpad bytes:
/// little-endian word, `9 + offset` significant bits, scaled by
/// `2 << offset`.
pub(crate) fn decode_temperature(buf: &[u8; SCRATCHPAD_LEN], resolution: Resolution) -> (i32, f32) {
    let word = LittleEndian::read_u16(&buf[0..2]);
    let raw = sign_extend(word, 9 + resolution.offset());
    let celsius = raw as f32 / (2 << resolution.offset()) as f32;
    (raw, celsius)
}
