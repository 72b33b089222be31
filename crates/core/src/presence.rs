//! Local typing/presence state machine.
//!
//! Keystrokes move the session to `Composing` and arm a debounce timer. When
//! the timer fires with no keystrokes since it was armed, the state settles
//! to `Paused` (text left in the compose box) or `Active` (box empty). The
//! machine never touches a clock itself: arming and cancelling the timer are
//! returned as effects and firings come back through [`PresenceMachine::debounce_fired`].

use crate::vocab::Vocabulary;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default quiet period before composing settles.
pub const PAUSE_DELAY: Duration = Duration::from_millis(5000);

/// Local chat state as announced to peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresenceState {
    #[default]
    Blank,
    Active,
    Composing,
    Paused,
    Inactive,
}

impl Vocabulary for PresenceState {
    const ALL: &'static [Self] = &[
        PresenceState::Blank,
        PresenceState::Active,
        PresenceState::Composing,
        PresenceState::Paused,
        PresenceState::Inactive,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            PresenceState::Blank => "blank",
            PresenceState::Active => "active",
            PresenceState::Composing => "composing",
            PresenceState::Paused => "paused",
            PresenceState::Inactive => "inactive",
        }
    }
}

/// Identifies one arming of the debounce timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(pub u64);

/// Side effect requested by a presence transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEffect {
    /// Announce the new state to peers (if connected).
    Notify(PresenceState),
    /// Schedule `debounce_fired(token)` after `delay`, replacing any pending timer.
    ArmTimer { token: TimerToken, delay: Duration },
    /// Drop the pending timer.
    CancelTimer,
}

/// Presence state plus the debounce bookkeeping behind it.
#[derive(Debug, Clone)]
pub struct PresenceMachine {
    state: PresenceState,
    delay: Duration,
    keystrokes: u64,
    baseline: u64,
    pending: Option<TimerToken>,
    next_token: u64,
}

impl Default for PresenceMachine {
    fn default() -> Self {
        Self::new(PAUSE_DELAY)
    }
}

impl PresenceMachine {
    pub fn new(delay: Duration) -> Self {
        Self {
            state: PresenceState::Blank,
            delay,
            keystrokes: 0,
            baseline: 0,
            pending: None,
            next_token: 0,
        }
    }

    pub fn state(&self) -> PresenceState {
        self.state
    }

    pub fn keystrokes(&self) -> u64 {
        self.keystrokes
    }

    /// Token of the timer currently armed, if any.
    pub fn pending_timer(&self) -> Option<TimerToken> {
        self.pending
    }

    pub fn is_inactive(&self) -> bool {
        self.state == PresenceState::Inactive
    }

    /// Change the quiet period. Applies from the next arming.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// A key was pressed in the compose box.
    pub fn key_pressed(&mut self) -> Vec<PresenceEffect> {
        if self.is_inactive() {
            return Vec::new();
        }
        self.keystrokes += 1;
        self.transition(PresenceState::Composing)
    }

    /// The debounce timer armed with `token` elapsed.
    pub fn debounce_fired(&mut self, token: TimerToken, buffer_empty: bool) -> Vec<PresenceEffect> {
        if self.pending != Some(token) {
            debug!(token = token.0, "ignoring stale debounce timer");
            return Vec::new();
        }
        self.pending = None;

        if self.state != PresenceState::Composing {
            return Vec::new();
        }

        if self.keystrokes > self.baseline {
            self.baseline = self.keystrokes;
            return vec![self.arm()];
        }

        let next = if buffer_empty {
            PresenceState::Active
        } else {
            PresenceState::Paused
        };
        self.transition(next)
    }

    /// A message was sent from the compose box.
    pub fn message_sent(&mut self) -> Vec<PresenceEffect> {
        self.transition(PresenceState::Active)
    }

    /// The session is closing.
    pub fn close(&mut self) -> Vec<PresenceEffect> {
        self.transition(PresenceState::Inactive)
    }

    fn arm(&mut self) -> PresenceEffect {
        self.next_token += 1;
        let token = TimerToken(self.next_token);
        self.pending = Some(token);
        PresenceEffect::ArmTimer {
            token,
            delay: self.delay,
        }
    }

    fn transition(&mut self, next: PresenceState) -> Vec<PresenceEffect> {
        if self.state == next || self.is_inactive() {
            return Vec::new();
        }

        let mut effects = Vec::new();
        if self.pending.take().is_some() {
            effects.push(PresenceEffect::CancelTimer);
        }

        debug!(from = self.state.as_str(), to = next.as_str(), "presence transition");
        self.state = next;
        effects.push(PresenceEffect::Notify(next));

        if next == PresenceState::Composing {
            self.baseline = self.keystrokes;
            effects.push(self.arm());
        }

        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifies(effects: &[PresenceEffect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, PresenceEffect::Notify(_)))
            .count()
    }

    fn armed(effects: &[PresenceEffect]) -> Option<TimerToken> {
        effects.iter().find_map(|e| match e {
            PresenceEffect::ArmTimer { token, .. } => Some(*token),
            _ => None,
        })
    }

    #[test]
    fn test_first_keystroke_composes() {
        let mut machine = PresenceMachine::default();
        assert_eq!(machine.state(), PresenceState::Blank);

        let effects = machine.key_pressed();
        assert_eq!(machine.state(), PresenceState::Composing);
        assert_eq!(notifies(&effects), 1);
        assert!(matches!(
            effects.last(),
            Some(PresenceEffect::ArmTimer { delay, .. }) if *delay == PAUSE_DELAY
        ));
    }

    #[test]
    fn test_burst_notifies_once() {
        let mut machine = PresenceMachine::default();
        let mut total = 0;
        for _ in 0..10 {
            total += notifies(&machine.key_pressed());
        }
        assert_eq!(total, 1);
        assert_eq!(machine.keystrokes(), 10);
    }

    #[test]
    fn test_debounce_rearms_after_more_typing() {
        let mut machine = PresenceMachine::default();
        let token = armed(&machine.key_pressed()).unwrap();
        machine.key_pressed();

        let effects = machine.debounce_fired(token, false);
        assert_eq!(notifies(&effects), 0);
        assert_eq!(machine.state(), PresenceState::Composing);
        let second = armed(&effects).expect("timer re-armed");
        assert_ne!(second, token);

        let effects = machine.debounce_fired(second, false);
        assert_eq!(effects, vec![PresenceEffect::Notify(PresenceState::Paused)]);
    }

    #[test]
    fn test_debounce_settles_by_buffer() {
        let mut machine = PresenceMachine::default();
        let token = armed(&machine.key_pressed()).unwrap();
        machine.debounce_fired(token, false);
        assert_eq!(machine.state(), PresenceState::Paused);

        let token = armed(&machine.key_pressed()).unwrap();
        machine.debounce_fired(token, true);
        assert_eq!(machine.state(), PresenceState::Active);
    }

    #[test]
    fn test_stale_token_ignored() {
        let mut machine = PresenceMachine::default();
        let token = armed(&machine.key_pressed()).unwrap();

        let effects = machine.message_sent();
        assert!(effects.contains(&PresenceEffect::CancelTimer));
        assert_eq!(machine.state(), PresenceState::Active);
        assert!(machine.debounce_fired(token, false).is_empty());
        assert_eq!(machine.state(), PresenceState::Active);
    }

    #[test]
    fn test_inactive_is_terminal() {
        let mut machine = PresenceMachine::default();
        machine.key_pressed();
        let effects = machine.close();
        assert!(effects.contains(&PresenceEffect::Notify(PresenceState::Inactive)));
        assert_eq!(machine.pending_timer(), None);

        assert!(machine.key_pressed().is_empty());
        assert!(machine.message_sent().is_empty());
        assert_eq!(machine.state(), PresenceState::Inactive);
    }

    #[test]
    fn test_same_state_is_noop() {
        let mut machine = PresenceMachine::default();
        assert_eq!(notifies(&machine.message_sent()), 1);
        assert!(machine.message_sent().is_empty());
    }
}
