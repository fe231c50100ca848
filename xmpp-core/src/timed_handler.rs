use std::time::{Duration, Instant};

/// Opaque reference to a registered [`TimedHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimedHandlerRef(pub(crate) u64);

/// A callback fired on a periodic schedule. A `true` return rearms it
/// (resetting the last-fired timestamp to the firing time); `false` removes
/// it.
pub struct TimedHandler {
    period: Duration,
    last_called: Instant,
    pub user: bool,
    callback: Box<dyn FnMut() -> bool + Send>,
}

impl TimedHandler {
    pub fn new(period: Duration, user: bool, callback: impl FnMut() -> bool + Send + 'static) -> TimedHandler {
        TimedHandler {
            period,
            last_called: Instant::now(),
            user,
            callback: Box::new(callback),
        }
    }

    /// Whether `now - last_called >= period`.
    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_called) >= self.period
    }

    /// Fires the callback and, if it returns `true`, rearms the handler.
    /// Returns whether the handler should be kept.
    pub fn fire(&mut self, now: Instant) -> bool {
        let keep = (self.callback)();
        if keep {
            self.last_called = now;
        }
        keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_due_immediately() {
        let handler = TimedHandler::new(Duration::from_millis(100), true, || true);
        assert!(!handler.is_due(Instant::now()));
    }

    #[test]
    fn due_after_period_elapses() {
        let handler = TimedHandler::new(Duration::from_millis(1), true, || true);
        std::thread::sleep(Duration::from_millis(5));
        assert!(handler.is_due(Instant::now()));
    }

    #[test]
    fn fire_rearms_on_true() {
        let mut calls = 0;
        let mut handler = TimedHandler::new(Duration::from_millis(1), true, move || {
            calls += 1;
            true
        });
        let before = handler.last_called;
        std::thread::sleep(Duration::from_millis(2));
        let now = Instant::now();
        assert!(handler.fire(now));
        assert!(handler.last_called > before);
    }

    #[test]
    fn fire_does_not_rearm_on_false() {
        let mut handler = TimedHandler::new(Duration::from_millis(1), true, || false);
        let before = handler.last_called;
        assert!(!handler.fire(Instant::now()));
        assert_eq!(handler.last_called, before);
    }
}
