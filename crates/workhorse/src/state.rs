use portable_atomic::{AtomicU8, Ordering};

/// Lifecycle of every pool and logger in this crate.
///
/// Transitions are linear and one-way:
///
/// ```text
/// Created -> Accepting -> ShuttingDown -> Closed
/// ```
///
/// Nothing is ever reopened. A component reports `Created` only while its
/// constructor is still spawning workers, so callers normally first observe
/// `Accepting`.
///
/// # Example
///
/// ```
/// use workhorse::{State, WorkPool};
///
/// let pool = WorkPool::new(2).unwrap();
/// assert_eq!(pool.state(), State::Accepting);
/// pool.shutdown().unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum State {
    /// Workers are being spawned.
    Created = 0,
    /// Submissions are accepted.
    Accepting = 1,
    /// The queue has been closed and remaining work is draining.
    ShuttingDown = 2,
    /// Every worker has exited.
    Closed = 3,
}

impl State {
    /// Returns `true` if the component still takes new work.
    pub const fn is_accepting(self) -> bool {
        matches!(self, Self::Accepting)
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Created,
            1 => Self::Accepting,
            2 => Self::ShuttingDown,
            _ => Self::Closed,
        }
    }
}

/// Atomic cell holding a [`State`].
#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(State::Created as u8))
    }

    pub(crate) fn load(&self) -> State {
        State::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: State) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves from `from` to `to`. Returns `false` if the current state was not
    /// `from`, which is how callers detect a second shutdown.
    pub(crate) fn transition(&self, from: State, to: State) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_one_way() {
        let state = AtomicState::new();
        assert_eq!(state.load(), State::Created);

        assert!(state.transition(State::Created, State::Accepting));
        assert!(state.load().is_accepting());

        assert!(state.transition(State::Accepting, State::ShuttingDown));
        assert!(!state.transition(State::Accepting, State::ShuttingDown));

        state.store(State::Closed);
        assert_eq!(state.load(), State::Closed);
        assert!(!state.transition(State::Created, State::Accepting));
    }

    #[test]
    fn states_are_ordered_by_lifecycle() {
        assert!(State::Created < State::Accepting);
        assert!(State::Accepting < State::ShuttingDown);
        assert!(State::ShuttingDown < State::Closed);
    }
}
