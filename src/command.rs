pub trait OpCode {
    fn op_code(&self) -> u8;
}

/// ROM-level commands shared by every 1-Wire device.
#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum Command {
    ReadRom = 0x33,
    MatchRom = 0x55,
    SkipRom = 0xCC,
    SearchRom = 0xF0,
    SearchRomAlarmed = 0xEC,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}
