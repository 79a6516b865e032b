#![no_std]
#![doc = include_str!("../README.md")]

mod address;
mod bridge;
mod command;
mod config;
#[cfg(feature = "ds18x20")]
pub mod ds18x20;
#[cfg(feature = "ds1990")]
pub mod ds1990;
mod error;
#[cfg(feature = "ds18x20")]
mod scratchpad;
#[cfg(feature = "ds18x20")]
mod store;

pub use address::Address;
pub use bridge::{Bridge, ChannelId, PowerLevel};
pub use command::{Command, OpCode};
pub use config::{BusConfig, PowerMode};
#[cfg(feature = "ds18x20")]
pub use ds18x20::Thermometers;
#[cfg(feature = "ds1990")]
pub use ds1990::TagFilter;
pub use error::{BusError, DiscoveryError, ProtocolError};
#[cfg(feature = "ds18x20")]
pub use scratchpad::{FamilyState, Resolution};
#[cfg(feature = "ds18x20")]
pub use store::{DeviceIndex, DeviceStore};

/// Maxim CRC-8, continued from `crc`.
///
/// A buffer whose final byte is the checksum of the preceding bytes computes
/// to zero as a whole.
pub fn compute_partial_crc8(crc: u8, data: &[u8]) -> u8 {
    let mut crc = crc;
    for byte in data.iter() {
        let mut byte = *byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0x00 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
    }
    crc
}
