#[cfg(test)]
use mockall::automock;

/// Free-running microsecond counter (wraps at 2^32)
#[cfg_attr(test, automock)]
pub trait MicrosClock {
    fn now_us(&mut self) -> u32;
}

/// A poll ran out of time before its condition held
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timeout;

/// Start time plus budget, checked against the counter without blocking.
#[derive(Copy, Clone, Eq, PartialEq, Default)]
#[cfg_attr(test, derive(Debug))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Deadline {
    start_us: u32,
    timeout_us: u32,
}

impl Deadline {
    pub fn start<C: MicrosClock + ?Sized>(clock: &mut C, timeout_us: u32) -> Self {
        Self {
            start_us: clock.now_us(),
            timeout_us,
        }
    }

    pub fn is_expired<C: MicrosClock + ?Sized>(&self, clock: &mut C) -> bool {
        clock.now_us().wrapping_sub(self.start_us) > self.timeout_us
    }
}

/// Busy-poll `predicate` until it returns true or `timeout_us` elapses.
///
/// The predicate gets the same object the clock lives on, so register reads
/// and the counter can come from one platform handle. It is always evaluated
/// at least once.
pub fn poll_with_deadline<P, F>(platform: &mut P, timeout_us: u32, mut predicate: F) -> Result<(), Timeout>
where
    P: MicrosClock + ?Sized,
    F: FnMut(&mut P) -> bool,
{
    let deadline = Deadline::start(platform, timeout_us);
    loop {
        if predicate(platform) {
            return Ok(());
        }
        if deadline.is_expired(platform) {
            return Err(Timeout);
        }
    }
}
