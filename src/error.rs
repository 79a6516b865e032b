use core::fmt::Debug;

/// Transport-level failure. Never retried at this layer.
#[derive(Debug)]
pub enum BusError<E: Debug> {
    /// No device answered the bus reset
    NoPresence,
    /// The bridge rejected the channel selection
    ChannelSelectFailed,
    /// Underlying bridge transport error
    Port(E),
}

impl<E: Debug> From<E> for BusError<E> {
    fn from(e: E) -> Self {
        BusError::Port(e)
    }
}

/// Failure of an addressed scratchpad transaction.
#[derive(Debug)]
pub enum ProtocolError<E: Debug> {
    /// The scratchpad never validated within the retry budget; any previous
    /// decoded value is left in place
    CrcExhausted { attempts: u8 },
    Bus(BusError<E>),
}

impl<E: Debug> From<BusError<E>> for ProtocolError<E> {
    fn from(e: BusError<E>) -> Self {
        ProtocolError::Bus(e)
    }
}

/// Failure reported by device discovery.
#[derive(Debug)]
pub enum DiscoveryError<E: Debug> {
    /// Fewer devices enumerated than the bus scan reported. The store holds
    /// the subset that was found and stays usable.
    PartialEnumeration { found: usize, expected: usize },
    /// The record store cannot hold the reported device count.
    AllocationFailed { requested: usize, capacity: usize },
    Bus(BusError<E>),
}

impl<E: Debug> From<BusError<E>> for DiscoveryError<E> {
    fn from(e: BusError<E>) -> Self {
        DiscoveryError::Bus(e)
    }
}
