//! Identification-tag (family `0x01`) read debouncing.
//!
//! A tag held against a reader produces a stream of identical reads on that
//! channel. The filter passes the first one through and suppresses repeats
//! until the cooldown window lapses, independently per channel.

use log::debug;

use crate::{Address, ChannelId};

/// Family code of the read-only identification tags.
pub const FAMILY_CODE: u8 = 0x01;

/// Seconds-resolution timestamp supplied by the host clock.
pub type Seconds = u32;

/// Default suppression window.
pub const DEFAULT_COOLDOWN: Seconds = 5;

/// Most recent accepted read on one channel.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelState {
    last_address: Option<Address>,
    last_seen: Seconds,
}

/// Per-channel duplicate-read filter for `C` bridge channels.
///
/// State lives for the process lifetime; channels start empty and are never
/// cleared.
#[derive(Debug)]
pub struct TagFilter<const C: usize> {
    channels: [ChannelState; C],
    cooldown: Seconds,
}

impl<const C: usize> Default for TagFilter<C> {
    fn default() -> Self {
        TagFilter::new(DEFAULT_COOLDOWN)
    }
}

impl<const C: usize> TagFilter<C> {
    pub const fn new(cooldown: Seconds) -> Self {
        TagFilter {
            channels: [ChannelState {
                last_address: None,
                last_seen: 0,
            }; C],
            cooldown,
        }
    }

    pub const fn cooldown(&self) -> Seconds {
        self.cooldown
    }

    /// Decide whether a raw tag read should be propagated downstream.
    ///
    /// Returns `false` when `address` repeats the channel's previous tag
    /// within the cooldown window; otherwise records the read and returns
    /// `true`. A tag held in place past the window re-triggers — it is
    /// still present and gets re-confirmed.
    pub fn handle_tag_read(&mut self, channel: ChannelId, address: Address, now: Seconds) -> bool {
        let Some(state) = self.channels.get_mut(channel.index()) else {
            debug!("tag {} on unmapped channel {}, passed through", address, channel);
            return true;
        };

        if state.last_address == Some(address) && now.wrapping_sub(state.last_seen) <= self.cooldown
        {
            debug!(
                "tag {} repeated on channel {} within {}s, suppressed",
                address, channel, self.cooldown
            );
            return false;
        }

        state.last_address = Some(address);
        state.last_seen = now;
        debug!("tag {} accepted on channel {}", address, channel);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(serial: u8) -> Address {
        let mut raw = [FAMILY_CODE, serial, 0, 0, 0, 0, 0, 0];
        raw[7] = crate::compute_partial_crc8(0, &raw[..7]);
        Address::from(raw)
    }

    #[test]
    fn repeat_inside_window_is_suppressed() {
        let mut filter: TagFilter<8> = TagFilter::new(5);
        assert!(filter.handle_tag_read(ChannelId(0), tag(1), 0));
        assert!(!filter.handle_tag_read(ChannelId(0), tag(1), 3));
        assert!(!filter.handle_tag_read(ChannelId(0), tag(1), 5));
    }

    #[test]
    fn repeat_after_window_retriggers() {
        let mut filter: TagFilter<8> = TagFilter::new(5);
        assert!(filter.handle_tag_read(ChannelId(0), tag(1), 0));
        assert!(filter.handle_tag_read(ChannelId(0), tag(1), 6));
    }

    #[test]
    fn different_tag_never_suppressed() {
        let mut filter: TagFilter<8> = TagFilter::new(5);
        assert!(filter.handle_tag_read(ChannelId(0), tag(1), 0));
        assert!(filter.handle_tag_read(ChannelId(0), tag(2), 1));
        // The new tag owns the window now; the old one reads as fresh again.
        assert!(filter.handle_tag_read(ChannelId(0), tag(1), 2));
    }

    #[test]
    fn channels_filter_independently() {
        let mut filter: TagFilter<8> = TagFilter::new(5);
        assert!(filter.handle_tag_read(ChannelId(0), tag(1), 0));
        assert!(filter.handle_tag_read(ChannelId(1), tag(1), 1));
        assert!(!filter.handle_tag_read(ChannelId(0), tag(1), 2));
        assert!(!filter.handle_tag_read(ChannelId(1), tag(1), 2));
    }

    #[test]
    fn suppressed_read_does_not_extend_the_window() {
        let mut filter: TagFilter<8> = TagFilter::new(5);
        assert!(filter.handle_tag_read(ChannelId(0), tag(1), 0));
        assert!(!filter.handle_tag_read(ChannelId(0), tag(1), 4));
        // Window still anchors at t=0, so t=6 re-triggers.
        assert!(filter.handle_tag_read(ChannelId(0), tag(1), 6));
    }

    #[test]
    fn unmapped_channel_passes_through() {
        let mut filter: TagFilter<2> = TagFilter::new(5);
        assert!(filter.handle_tag_read(ChannelId(7), tag(1), 0));
        assert!(filter.handle_tag_read(ChannelId(7), tag(1), 0));
    }
}
