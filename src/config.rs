/// How the device population draws power.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerMode {
    /// Devices steal power from the data line. Conversions and EEPROM copies
    /// need strong pull-up held for their full duration.
    #[default]
    Parasitic,
    /// Devices run from a switched external rail; no pull-up sequencing.
    Switched,
}

/// Deployment description: power topology and bridge channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    pub power_mode: PowerMode,
    pub channel_count: u8,
}

impl BusConfig {
    pub const fn new(power_mode: PowerMode, channel_count: u8) -> Self {
        BusConfig {
            power_mode,
            channel_count,
        }
    }

    pub const fn is_parasitic(&self) -> bool {
        matches!(self.power_mode, PowerMode::Parasitic)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig::new(PowerMode::Parasitic, 8)
    }
}
