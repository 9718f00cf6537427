//! Edge detection over polled lock state

/// A change the lock surface has to make
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Raise,
    Lower,
}

/// Last `locked` value and lock message the agent acted on.
///
/// Starts unlocked, so an agent that boots while the server is locked
/// raises on its first successful fetch.
#[derive(Debug, Default)]
pub struct PollShadow {
    locked: bool,
    message: Option<String>,
}

impl PollShadow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Record an observation; returns the transition it implies, if any
    pub fn observe(&mut self, locked: bool) -> Option<Transition> {
        let transition = match (self.locked, locked) {
            (false, true) => Some(Transition::Raise),
            (true, false) => Some(Transition::Lower),
            _ => None,
        };
        self.locked = locked;
        if !locked {
            self.message = None;
        }
        transition
    }

    /// Record the message shown while locked; true if it differs from the
    /// one already on the surface
    pub fn message_changed(&mut self, message: &str) -> bool {
        if self.message.as_deref() == Some(message) {
            return false;
        }
        self.message = Some(message.to_string());
        true
    }
}
