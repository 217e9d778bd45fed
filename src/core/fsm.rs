//! Table-driven finite state machine.
//!
//! Transitions are declared as a static list of [`TransitionRule`]s and
//! compiled into a [`TransitionTable`] once. A table is rejected if the same
//! `(event, source)` pair appears twice, so every event resolves to at most
//! one destination. The table never owns callbacks; callers inspect the
//! returned [`Transition`] and decide which hooks to run.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::core::ShimError;

/// One row of a transition table: `event` moves any of `sources` to `destination`.
#[derive(Debug, Clone, Copy)]
pub struct TransitionRule<S: 'static, E> {
    /// Triggering event.
    pub event: E,
    /// States the event is legal from.
    pub sources: &'static [S],
    /// Resulting state.
    pub destination: S,
}

/// Validated `(event, source) -> destination` lookup.
#[derive(Debug)]
pub struct TransitionTable<S, E> {
    routes: HashMap<(E, S), S>,
}

impl<S, E> TransitionTable<S, E>
where
    S: Copy + Eq + Hash + fmt::Debug,
    E: Copy + Eq + Hash + fmt::Debug,
{
    /// Build a table from rules, rejecting duplicate `(event, source)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::InvalidStateMachine`] when a pair is declared twice
    /// or a rule lists no source states.
    pub fn new(rules: &[TransitionRule<S, E>]) -> Result<Self, ShimError> {
        let mut routes = HashMap::new();
        for rule in rules {
            if rule.sources.is_empty() {
                return Err(ShimError::InvalidStateMachine(format!(
                    "event {:?} has no source states",
                    rule.event
                )));
            }
            for src in rule.sources {
                if routes.insert((rule.event, *src), rule.destination).is_some() {
                    return Err(ShimError::InvalidStateMachine(format!(
                        "event {:?} declared twice from state {:?}",
                        rule.event, src
                    )));
                }
            }
        }
        Ok(Self { routes })
    }

    /// Destination for `event` fired in `state`, if legal.
    #[must_use]
    pub fn destination(&self, state: S, event: E) -> Option<S> {
        self.routes.get(&(event, state)).copied()
    }

    /// Number of `(event, source)` routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True when the table holds no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Outcome of firing a legal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<S> {
    /// The state changed.
    Moved {
        /// State before the event.
        from: S,
        /// State after the event.
        to: S,
    },
    /// The event was legal but its destination equals the current state.
    Stayed(S),
}

/// Current state plus a reference to a shared, validated table.
#[derive(Debug)]
pub struct StateMachine<S: 'static, E: 'static> {
    current: S,
    table: &'static TransitionTable<S, E>,
}

impl<S, E> StateMachine<S, E>
where
    S: Copy + Eq + Hash + fmt::Debug,
    E: Copy + Eq + Hash + fmt::Debug,
{
    /// Start a machine in `initial` over `table`.
    #[must_use]
    pub const fn new(initial: S, table: &'static TransitionTable<S, E>) -> Self {
        Self {
            current: initial,
            table,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn current(&self) -> S {
        self.current
    }

    /// Whether `event` is legal from the current state.
    #[must_use]
    pub fn can(&self, event: E) -> bool {
        self.table.destination(self.current, event).is_some()
    }

    /// Fire `event`. Returns `None` and leaves the state untouched if illegal.
    pub fn fire(&mut self, event: E) -> Option<Transition<S>> {
        let to = self.table.destination(self.current, event)?;
        let from = self.current;
        if from == to {
            return Some(Transition::Stayed(to));
        }
        self.current = to;
        Some(Transition::Moved { from, to })
    }

    /// Overwrite the current state without consulting the table.
    pub fn set_state(&mut self, state: S) {
        self.current = state;
    }
}
