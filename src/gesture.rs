//! Long-press versus click disambiguation for calendar cells.
//!
//! A press held for [`LONG_PRESS`] toggles the day. The click event that the
//! platform delivers after releasing a long-press must not also select it, so
//! clicks arriving within [`CLICK_COOLDOWN`] of that release are swallowed.

use std::time::{Duration, Instant};

pub const LONG_PRESS: Duration = Duration::from_millis(800);
pub const CLICK_COOLDOWN: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureEvent {
    LongPress,
    Click,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Pressing { deadline: Instant },
    Fired,
}

#[derive(Debug, Clone)]
pub struct PressTracker {
    phase: Phase,
    suppress_click_until: Option<Instant>,
}

impl Default for PressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PressTracker {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            suppress_click_until: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// When the pending long-press fires, if one is armed. Callers schedule a
    /// timer for this instant and call [`PressTracker::poll`] when it elapses.
    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Pressing { deadline } => Some(deadline),
            _ => None,
        }
    }

    pub fn press(&mut self, now: Instant) {
        self.phase = Phase::Pressing {
            deadline: now + LONG_PRESS,
        };
    }

    /// Fires the long-press once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<GestureEvent> {
        match self.phase {
            Phase::Pressing { deadline } if now >= deadline => {
                self.phase = Phase::Fired;
                Some(GestureEvent::LongPress)
            }
            _ => None,
        }
    }

    /// Ends the press. A release before the deadline cancels the long-press;
    /// a release after it opens the click cooldown window.
    pub fn release(&mut self, now: Instant) -> Option<GestureEvent> {
        let fired = match self.phase {
            Phase::Pressing { deadline } if now >= deadline => Some(GestureEvent::LongPress),
            Phase::Fired => None,
            Phase::Pressing { .. } | Phase::Idle => {
                self.phase = Phase::Idle;
                return None;
            }
        };
        self.phase = Phase::Idle;
        self.suppress_click_until = Some(now + CLICK_COOLDOWN);
        fired
    }

    /// Moving off the cell aborts the press without any event.
    pub fn cancel(&mut self) {
        if let Phase::Pressing { .. } = self.phase {
            self.phase = Phase::Idle;
        }
    }

    pub fn click(&mut self, now: Instant) -> Option<GestureEvent> {
        if let Some(until) = self.suppress_click_until.take() {
            if now <= until {
                return None;
            }
        }
        Some(GestureEvent::Click)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_press_is_a_click() {
        let t0 = Instant::now();
        let mut tracker = PressTracker::new();
        tracker.press(t0);
        assert_eq!(tracker.deadline(), Some(t0 + LONG_PRESS));
        assert_eq!(tracker.poll(t0 + Duration::from_millis(300)), None);
        assert_eq!(tracker.release(t0 + Duration::from_millis(300)), None);
        assert!(tracker.is_idle());
        assert_eq!(tracker.deadline(), None);
        assert_eq!(tracker.click(t0 + Duration::from_millis(301)), Some(GestureEvent::Click));
    }

    #[test]
    fn long_press_swallows_trailing_click() {
        let t0 = Instant::now();
        let mut tracker = PressTracker::new();
        tracker.press(t0);
        assert_eq!(tracker.poll(t0 + LONG_PRESS), Some(GestureEvent::LongPress));
        assert_eq!(tracker.poll(t0 + LONG_PRESS), None);

        let released = t0 + Duration::from_millis(900);
        assert_eq!(tracker.release(released), None);
        assert_eq!(tracker.click(released + Duration::from_millis(20)), None);
        assert_eq!(
            tracker.click(released + Duration::from_millis(40)),
            Some(GestureEvent::Click)
        );
    }

    #[test]
    fn release_after_missed_timer_still_fires_once() {
        let t0 = Instant::now();
        let mut tracker = PressTracker::new();
        tracker.press(t0);
        let released = t0 + Duration::from_millis(850);
        assert_eq!(tracker.release(released), Some(GestureEvent::LongPress));
        assert_eq!(tracker.click(released), None);
    }

    #[test]
    fn click_after_cooldown_selects() {
        let t0 = Instant::now();
        let mut tracker = PressTracker::new();
        tracker.press(t0);
        tracker.poll(t0 + LONG_PRESS);
        let released = t0 + LONG_PRESS;
        tracker.release(released);
        assert_eq!(
            tracker.click(released + CLICK_COOLDOWN + Duration::from_millis(1)),
            Some(GestureEvent::Click)
        );
    }

    #[test]
    fn cancel_disarms_pending_press() {
        let t0 = Instant::now();
        let mut tracker = PressTracker::new();
        tracker.press(t0);
        tracker.cancel();
        assert_eq!(tracker.poll(t0 + LONG_PRESS * 2), None);
        assert_eq!(tracker.click(t0 + LONG_PRESS * 2), Some(GestureEvent::Click));
    }
}
