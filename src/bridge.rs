use crate::{Address, Command, OpCode};
use core::fmt::{Debug, Display, Formatter, Result as FmtResult};

/// Drive level of the bus line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerLevel {
    Standard,
    /// Elevated drive supplying current to parasitically powered devices.
    /// No other bus transaction may run while this is asserted.
    StrongPullUp,
}

/// Bus channel number on the bridge (multi-channel bridges expose up to
/// eight).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId(pub u8);

impl ChannelId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for ChannelId {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// Byte-level transaction interface of the bus bridge.
///
/// Implementations own the reset/bit/byte primitives, the ROM search and the
/// link-layer CRC; this crate only sequences them. An implementation is
/// expected to keep the ROM-addressing latch and pull-up state consistent
/// between calls, which is why one logical operation holds `&mut self` for
/// its full duration.
pub trait Bridge {
    type Error: Debug;

    /// Route subsequent bus traffic to the given channel.
    fn select_channel(&mut self, channel: ChannelId) -> Result<(), Self::Error>;

    /// Issue a bus reset, returning whether a presence pulse was seen.
    fn reset(&mut self) -> Result<bool, Self::Error>;

    /// Write one byte, leaving the line at standard level afterwards.
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Write one byte and assert strong pull-up as its last bit completes.
    fn write_byte_powered(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Read `buf.len()` bytes into `buf`.
    fn read_block(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write all of `buf`.
    fn write_block(&mut self, buf: &[u8]) -> Result<(), Self::Error>;

    /// Force the line drive level.
    fn set_power_level(&mut self, level: PowerLevel) -> Result<(), Self::Error>;

    /// Switch an externally supplied power rail for one channel.
    ///
    /// Parasitic deployments keep the no-op default.
    fn set_channel_power(&mut self, _channel: ChannelId, _on: bool) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Validate a buffer whose final byte is the CRC-8 of the rest.
    fn crc8_check(&self, buf: &[u8]) -> bool {
        crate::compute_partial_crc8(0, buf) == 0
    }

    /// Walk one device family across every channel, invoking `visit` once
    /// per discovered device with that device still addressed on the bus and
    /// its channel latched on the bridge. Returns the number of devices
    /// visited.
    fn scan_family(
        &mut self,
        family_code: u8,
        visit: &mut dyn FnMut(&mut Self, ChannelId, Address),
    ) -> Result<usize, Self::Error>;

    /// Address a single device: match-ROM followed by its full ROM id.
    fn match_rom(&mut self, address: &Address) -> Result<(), Self::Error>
    where
        Self: Sized,
    {
        self.write_command(Command::MatchRom)?;
        self.write_block(address.as_bytes())
    }

    /// Address every device on the selected channel at once.
    fn skip_rom(&mut self) -> Result<(), Self::Error>
    where
        Self: Sized,
    {
        self.write_command(Command::SkipRom)
    }

    fn write_command(&mut self, cmd: impl OpCode) -> Result<(), Self::Error>
    where
        Self: Sized,
    {
        self.write_byte(cmd.op_code())
    }

    fn write_command_powered(&mut self, cmd: impl OpCode) -> Result<(), Self::Error>
    where
        Self: Sized,
    {
        self.write_byte_powered(cmd.op_code())
    }
}
