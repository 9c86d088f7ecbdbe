use crate::ids::Slot;
use std::time::{Duration, SystemTime};

/// The wall-clock anchor a slot clock is driven from: a genesis instant and
/// a fixed per-slot duration (§3, §6 `slot.durationMs`).
#[derive(Clone, Copy, Debug)]
pub struct SlotClockParams {
    pub genesis: SystemTime,
    pub duration: Duration,
}

impl SlotClockParams {
    pub fn new(genesis: SystemTime, duration: Duration) -> Self {
        SlotClockParams { genesis, duration }
    }

    /// The slot that contains `now`, or `Slot(0)` if `now` precedes genesis.
    pub fn slot_at(&self, now: SystemTime) -> Slot {
        match now.duration_since(self.genesis) {
            Ok(elapsed) => Slot(elapsed.as_nanos() as u64 / self.duration.as_nanos().max(1) as u64),
            Err(_) => Slot(0),
        }
    }

    /// The instant at which `slot` starts.
    pub fn start_of(&self, slot: Slot) -> SystemTime {
        self.genesis + self.duration * slot.0 as u32
    }

    /// The instant at which `slot` ends (== start of `slot.next()`).
    pub fn end_of(&self, slot: Slot) -> SystemTime {
        self.start_of(slot.next())
    }

    /// The instant, within `slot`, at which the seal cutover fires, given
    /// `sealFraction` (default 2/3, §4.4).
    pub fn seal_of(&self, slot: Slot, seal_fraction: f64) -> SystemTime {
        let offset_nanos = (self.duration.as_nanos() as f64 * seal_fraction) as u64;
        self.start_of(slot) + Duration::from_nanos(offset_nanos)
    }

    /// Duration to sleep from `now` until `target`, zero if already passed.
    pub fn until(now: SystemTime, target: SystemTime) -> Duration {
        target.duration_since(now).unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_at_advances_with_duration() {
        let genesis = SystemTime::UNIX_EPOCH;
        let params = SlotClockParams::new(genesis, Duration::from_secs(12));
        assert_eq!(params.slot_at(genesis), Slot(0));
        assert_eq!(params.slot_at(genesis + Duration::from_secs(12)), Slot(1));
        assert_eq!(params.slot_at(genesis + Duration::from_secs(23)), Slot(1));
        assert_eq!(params.slot_at(genesis + Duration::from_secs(24)), Slot(2));
    }

    #[test]
    fn seal_of_uses_seal_fraction() {
        let genesis = SystemTime::UNIX_EPOCH;
        let params = SlotClockParams::new(genesis, Duration::from_secs(12));
        let seal = params.seal_of(Slot(0), 2.0 / 3.0);
        let expected = genesis + Duration::from_secs(8);
        let diff = seal.duration_since(expected).unwrap_or_else(|e| e.duration());
        assert!(diff < Duration::from_millis(1));
    }
}
