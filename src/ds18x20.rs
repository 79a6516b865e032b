//! Thermometer management for families `0x10` and `0x28`: discovery and
//! enumeration across all bridge channels, CRC-gated scratchpad access and
//! parasitic-power-aware conversion sequencing.

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::scratchpad::{
    decode_temperature, FamilyState, Resolution, CONFIG_RES_MASK, SCRATCHPAD_LEN,
};
use crate::store::{DeviceIndex, DeviceStore};
use crate::{
    Address, Bridge, BusConfig, BusError, ChannelId, DiscoveryError, OpCode, PowerLevel, PowerMode,
    ProtocolError,
};

/// Function commands understood by both thermometer families.
#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum Command {
    Convert = 0x44,
    WriteScratchpad = 0x4e,
    ReadScratchpad = 0xBE,
    CopyScratchpad = 0x48,
    RecallE2 = 0xB8,
    ReadPowerSupply = 0xB4,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

/// Thermometer families sharing the scratchpad command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Family {
    /// Fixed-function 9-bit parts
    Fam10,
    /// Configurable-resolution parts with a config register
    Fam28,
}

impl Family {
    pub const fn code(self) -> u8 {
        match self {
            Family::Fam10 => 0x10,
            Family::Fam28 => 0x28,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x10 => Some(Family::Fam10),
            0x28 => Some(Family::Fam28),
            _ => None,
        }
    }
}

/// Scratchpad read retry budget and backoff between attempts.
const READ_ATTEMPTS: u8 = 10;
const RETRY_BACKOFF_MS: u32 = 20;

/// Strong pull-up hold windows, milliseconds. The batch window carries extra
/// margin for bus-selection overhead across devices; the copy window holds
/// one above the 10 ms latch minimum.
const CONVERT_HOLD_MS: u32 = 752;
const CONVERT_HOLD_BATCH_MS: u32 = 760;
const COPY_HOLD_MS: u32 = 11;

/// One discovered thermometer.
#[derive(Debug, Clone)]
pub struct Ds18x20 {
    address: Address,
    channel: ChannelId,
    pub(crate) index: DeviceIndex,
    raw: [u8; SCRATCHPAD_LEN],
    state: FamilyState,
    resolution: Resolution,
    last_value: Option<f32>,
}

impl Ds18x20 {
    pub(crate) fn new(address: Address, channel: ChannelId, family: Family) -> Self {
        Ds18x20 {
            address,
            channel,
            index: DeviceIndex(0),
            raw: [0; SCRATCHPAD_LEN],
            state: FamilyState::empty(family),
            resolution: Resolution::Bits9,
            last_value: None,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn index(&self) -> DeviceIndex {
        self.index
    }

    pub fn family(&self) -> Family {
        self.state.family()
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Decoded scratchpad fields from the most recent verified read.
    pub fn state(&self) -> &FamilyState {
        &self.state
    }

    /// Most recently decoded temperature; `None` until the first verified
    /// read completes.
    pub fn last_value(&self) -> Option<f32> {
        self.last_value
    }

    pub(crate) fn set_thresholds(&mut self, hi: u8, lo: u8) {
        self.state.set_thresholds(hi, lo);
    }

    /// Select the record's channel, reset and address this single device.
    fn select_and_address<B: Bridge>(&self, bridge: &mut B) -> Result<(), BusError<B::Error>> {
        bridge
            .select_channel(self.channel)
            .map_err(|_| BusError::ChannelSelectFailed)?;
        if !bridge.reset()? {
            return Err(BusError::NoPresence);
        }
        bridge.match_rom(&self.address)?;
        Ok(())
    }

    /// Read and CRC-verify the scratchpad, retrying the full transaction on
    /// checksum failure. The verified buffer repopulates the decoded state.
    pub(crate) fn read_scratchpad<B: Bridge>(
        &mut self,
        bridge: &mut B,
        delay: &mut impl DelayNs,
    ) -> Result<(), ProtocolError<B::Error>> {
        for attempt in 1..=READ_ATTEMPTS {
            self.select_and_address(bridge)?;
            bridge
                .write_command(Command::ReadScratchpad)
                .map_err(BusError::Port)?;

            // Preset so a silent bus reads as 0xff, which never checksums.
            self.raw = [0xff; SCRATCHPAD_LEN];
            bridge.read_block(&mut self.raw).map_err(BusError::Port)?;

            if bridge.crc8_check(&self.raw) {
                self.state = FamilyState::decode(self.state.family(), &self.raw);
                return Ok(());
            }
            debug!(
                "{}: scratchpad crc failed, attempt {}/{}",
                self.address, attempt, READ_ATTEMPTS
            );
            if attempt < READ_ATTEMPTS {
                delay.delay_ms(RETRY_BACKOFF_MS);
            }
        }
        Err(ProtocolError::CrcExhausted {
            attempts: READ_ATTEMPTS,
        })
    }

    /// Write the staged thresholds (and config, family 28) to the device.
    /// The device returns no checksum for this command.
    pub(crate) fn write_scratchpad<B: Bridge>(
        &self,
        bridge: &mut B,
    ) -> Result<(), BusError<B::Error>> {
        self.select_and_address(bridge)?;
        bridge.write_command(Command::WriteScratchpad)?;
        let mut payload = [0u8; 3];
        let len = self.state.write_payload(&mut payload);
        bridge.write_block(&payload[..len])?;
        Ok(())
    }

    /// Persist the scratchpad to EEPROM. Parasitic deployments must hold
    /// strong pull-up until the device has latched the write; releasing
    /// early loses data.
    pub(crate) fn copy_scratchpad<B: Bridge>(
        &self,
        bridge: &mut B,
        delay: &mut impl DelayNs,
        power: PowerMode,
    ) -> Result<(), BusError<B::Error>> {
        self.select_and_address(bridge)?;
        match power {
            PowerMode::Parasitic => {
                bridge.write_command_powered(Command::CopyScratchpad)?;
                delay.delay_ms(COPY_HOLD_MS);
                bridge.set_power_level(PowerLevel::Standard)?;
            }
            PowerMode::Switched => {
                bridge.write_command(Command::CopyScratchpad)?;
            }
        }
        Ok(())
    }

    /// Trigger a conversion on this device alone and wait it out. The
    /// switched path needs no pull-up but keeps the same fixed delay.
    pub(crate) fn convert_temperature<B: Bridge>(
        &self,
        bridge: &mut B,
        delay: &mut impl DelayNs,
        power: PowerMode,
    ) -> Result<(), BusError<B::Error>> {
        self.select_and_address(bridge)?;
        match power {
            PowerMode::Parasitic => {
                bridge.write_command_powered(Command::Convert)?;
                delay.delay_ms(CONVERT_HOLD_MS);
                bridge.set_power_level(PowerLevel::Standard)?;
            }
            PowerMode::Switched => {
                bridge.write_command(Command::Convert)?;
                delay.delay_ms(CONVERT_HOLD_MS);
            }
        }
        Ok(())
    }

    /// Read the scratchpad back and decode the conversion result. A failed
    /// read leaves the previous value in place.
    pub(crate) fn read_temperature<B: Bridge>(
        &mut self,
        bridge: &mut B,
        delay: &mut impl DelayNs,
    ) -> Result<i32, ProtocolError<B::Error>> {
        self.read_scratchpad(bridge, delay)?;
        let (raw, celsius) = decode_temperature(&self.raw, self.resolution);
        self.last_value = Some(celsius);
        debug!("{}: raw={} value={}", self.address, raw, celsius);
        Ok(raw)
    }
}

/// The thermometer population behind one bridge.
///
/// `N` bounds how many records discovery may create. All bus operations take
/// the bridge by `&mut`, which serializes them for the shared line.
pub struct Thermometers<const N: usize> {
    store: DeviceStore<N>,
    config: BusConfig,
}

impl<const N: usize> Default for Thermometers<N> {
    fn default() -> Self {
        Thermometers::new(BusConfig::default())
    }
}

impl<const N: usize> Thermometers<N> {
    pub const fn new(config: BusConfig) -> Self {
        Thermometers {
            store: DeviceStore::new(),
            config,
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn store(&self) -> &DeviceStore<N> {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn get(&self, index: DeviceIndex) -> Option<&Ds18x20> {
        self.store.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ds18x20> {
        self.store.iter()
    }

    /// Last decoded value for a record; `None` for an unknown handle or a
    /// device that never completed a verified read.
    pub fn temperature(&self, index: DeviceIndex) -> Option<f32> {
        self.store.get(index).and_then(|record| record.last_value())
    }

    /// Populate the record store by scanning both thermometer families on
    /// every channel. Call once at startup, before any conversion or read.
    ///
    /// `expected` is the device count reported by the external bus scan. A
    /// shortfall is returned as [`DiscoveryError::PartialEnumeration`] with
    /// the store left holding the found subset.
    pub fn discover<B: Bridge>(
        &mut self,
        bridge: &mut B,
        delay: &mut impl DelayNs,
        expected: usize,
    ) -> Result<usize, DiscoveryError<B::Error>> {
        if expected > N {
            return Err(DiscoveryError::AllocationFailed {
                requested: expected,
                capacity: N,
            });
        }

        for family in [Family::Fam10, Family::Fam28] {
            let config = self.config;
            let store = &mut self.store;
            bridge
                .scan_family(family.code(), &mut |bridge, channel, address| {
                    enumerate(&mut *store, config, bridge, &mut *delay, channel, address);
                })
                .map_err(BusError::Port)?;
        }

        let found = self.store.len();
        if found != expected {
            warn!("discovery: only {} of {} devices enumerated", found, expected);
            return Err(DiscoveryError::PartialEnumeration { found, expected });
        }
        Ok(found)
    }

    /// Broadcast the convert command once per populated channel, sharing one
    /// wait window among all devices on that channel.
    ///
    /// A failing channel is skipped after logging so the remaining channels
    /// still convert; the first error is returned at the end.
    pub fn convert_all<B: Bridge>(
        &self,
        bridge: &mut B,
        delay: &mut impl DelayNs,
    ) -> Result<(), BusError<B::Error>> {
        let parasitic = self.config.is_parasitic();
        let mut first_error = None;
        for channel in self.store.channels() {
            if let Err(e) = convert_channel(bridge, delay, channel, parasitic) {
                warn!("convert: channel {} failed: {:?}", channel, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// One batch cycle: convert every channel, then read every record back.
    /// A record whose read fails keeps its previous value, and a failure on
    /// one device never stops the rest of the batch; the first conversion
    /// error is reported after all reads were attempted.
    pub fn convert_and_read_all<B: Bridge>(
        &mut self,
        bridge: &mut B,
        delay: &mut impl DelayNs,
    ) -> Result<(), BusError<B::Error>> {
        if self.store.is_empty() {
            return Ok(());
        }
        let converted = self.convert_all(bridge, delay);
        for record in self.store.iter_mut() {
            if record.read_temperature(bridge, delay).is_err() {
                warn!("{}: read failed, value stays stale", record.address());
            }
        }
        converted
    }

    /// Convert and re-read a single device outside the batch cycle. `None`
    /// for a handle this store never issued.
    pub fn refresh<B: Bridge>(
        &mut self,
        bridge: &mut B,
        delay: &mut impl DelayNs,
        index: DeviceIndex,
    ) -> Option<Result<i32, ProtocolError<B::Error>>> {
        let power = self.config.power_mode;
        let record = self.store.get_mut(index)?;
        if let Err(e) = record.convert_temperature(bridge, delay, power) {
            return Some(Err(ProtocolError::Bus(e)));
        }
        Some(record.read_temperature(bridge, delay))
    }

    /// Stage new alarm thresholds on one device, write them and persist to
    /// EEPROM. `None` for a handle this store never issued.
    pub fn set_thresholds<B: Bridge>(
        &mut self,
        bridge: &mut B,
        delay: &mut impl DelayNs,
        index: DeviceIndex,
        hi: u8,
        lo: u8,
    ) -> Option<Result<(), BusError<B::Error>>> {
        let power = self.config.power_mode;
        let record = self.store.get_mut(index)?;
        record.set_thresholds(hi, lo);
        if let Err(e) = record.write_scratchpad(bridge) {
            return Some(Err(e));
        }
        Some(record.copy_scratchpad(bridge, delay, power))
    }
}

fn convert_channel<B: Bridge>(
    bridge: &mut B,
    delay: &mut impl DelayNs,
    channel: ChannelId,
    parasitic: bool,
) -> Result<(), BusError<B::Error>> {
    bridge
        .select_channel(channel)
        .map_err(|_| BusError::ChannelSelectFailed)?;
    if !bridge.reset()? {
        return Err(BusError::NoPresence);
    }
    bridge.skip_rom()?;
    if parasitic {
        bridge.write_command_powered(Command::Convert)?;
        delay.delay_ms(CONVERT_HOLD_BATCH_MS);
        bridge.set_power_level(PowerLevel::Standard)?;
    } else {
        bridge.write_command(Command::Convert)?;
        delay.delay_ms(CONVERT_HOLD_BATCH_MS);
    }
    Ok(())
}

/// Per-device discovery step, invoked by the family scan with the device
/// already addressed. A failure here drops this device only; the scan moves
/// on to the next one.
fn enumerate<B: Bridge, D: DelayNs, const N: usize>(
    store: &mut DeviceStore<N>,
    config: BusConfig,
    bridge: &mut B,
    delay: &mut D,
    channel: ChannelId,
    address: Address,
) {
    let Some(family) = Family::from_code(address.family_code()) else {
        warn!(
            "enumerate: unsupported family {:#04x} at {}",
            address.family_code(),
            address
        );
        return;
    };
    if channel.index() >= config.channel_count as usize {
        warn!(
            "enumerate: {} reported on channel {} beyond the configured {}",
            address, channel, config.channel_count
        );
        return;
    }
    let Some(index) = store.push(Ds18x20::new(address, channel, family)) else {
        warn!("enumerate: record store full, skipping {}", address);
        return;
    };
    debug!(
        "enumerate: {} on channel {} as record {}",
        address,
        channel,
        index.position()
    );

    if config.power_mode == PowerMode::Switched {
        if bridge.set_channel_power(channel, true).is_err() {
            warn!("enumerate: external power assert failed on channel {}", channel);
        }
    }
    let initialized = init_record(store, index, config, bridge, delay);
    if config.power_mode == PowerMode::Switched {
        let _ = bridge.set_channel_power(channel, false);
    }
    if let Err(e) = initialized {
        warn!("enumerate: {} initial configuration failed: {:?}", address, e);
    }
}

/// First-contact configuration: initial scratchpad read, then resolution
/// normalization. Family 28 parts power up at 12 bits; the batch wait window
/// assumes 9.
fn init_record<B: Bridge, D: DelayNs, const N: usize>(
    store: &mut DeviceStore<N>,
    index: DeviceIndex,
    config: BusConfig,
    bridge: &mut B,
    delay: &mut D,
) -> Result<(), ProtocolError<B::Error>> {
    let Some(record) = store.get_mut(index) else {
        return Ok(());
    };
    record.read_scratchpad(bridge, delay)?;

    if let Some(config_byte) = record.state.config() {
        if config_byte & CONFIG_RES_MASK == CONFIG_RES_MASK {
            record
                .state
                .set_config(Resolution::Bits9.into_config(config_byte));
            record.write_scratchpad(bridge)?;
            record.copy_scratchpad(bridge, delay, config.power_mode)?;
            debug!("{}: resolution downgraded to 9 bits", record.address);
        }
    }
    record.resolution = Resolution::Bits9;
    Ok(())
}
