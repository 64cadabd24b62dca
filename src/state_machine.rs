// Copyright 2025 Cowboy AI, LLC.

//! Lifecycle state machines for governed entities
//!
//! Every governed entity kind shares one topology:
//!
//! ```text
//! INITIAL  --initial---> INITIAL   (self-loop, no side effect)
//! INITIAL  --ready-----> READY
//! INITIAL  --delete----> DELETED
//! READY    --initial---> INITIAL
//! READY    --archive---> ARCHIVED
//! READY    --delete----> DELETED
//! ARCHIVED --unarchive-> READY
//! ARCHIVED --delete----> DELETED
//! DELETED  : terminal
//! ```
//!
//! Definitional entities (data models, objects, elements) name the states
//! INITIAL/READY/ARCHIVED/DELETED and the events initial/ready/...;
//! instances and data values name them CREATED/INITIALIZED/ARCHIVED/DELETED
//! and create/initialize/.... [`ModelState`] and [`InstanceState`] carry
//! those names over the shared [`Phase`] table.
//!
//! A [`LifecycleMachine`] is embedded in each entity. It stores the state in
//! an atomic cell and applies transitions with compare-and-swap, so the table
//! is always consulted against the current state; lost races are retried a
//! bounded number of times.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{debug, error};

use crate::auditing::EventBus;
use crate::entity::ModelClass;
use crate::errors::{TradeError, TradeResult};
use crate::events::{EventSource, TradeEvent};

/// Default number of retries for a contended transition
pub const DEFAULT_TRANSITION_RETRIES: u32 = 8;

/// Input to a state machine transition
pub trait TransitionInput: Debug + Clone + Send + Sync {
    /// Get a description of this input for logging
    fn description(&self) -> String;
}

/// Trait for types that can be used as states in a state machine
pub trait State: Debug + Clone + PartialEq + Eq + Send + Sync {
    /// Get the name of this state for logging/debugging
    fn name(&self) -> &'static str;

    /// Check if this is a terminal state
    fn is_terminal(&self) -> bool {
        false
    }
}

/// Mealy Machine: the next state depends on current state AND input
pub trait MealyStateTransitions: State {
    /// The input type for transitions
    type Input: TransitionInput;

    /// Check if a transition is valid given the input
    fn can_transition_to(&self, target: &Self, input: &Self::Input) -> bool;

    /// Get valid transitions for a given input
    fn valid_transitions(&self, input: &Self::Input) -> Vec<Self>;
}

/// Name-independent position in the shared lifecycle topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// INITIAL / CREATED
    Initial,
    /// READY / INITIALIZED
    Ready,
    /// ARCHIVED
    Archived,
    /// DELETED (terminal)
    Deleted,
}

/// Name-independent lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    /// initial / create
    Initial,
    /// ready / initialize
    Ready,
    /// archive
    Archive,
    /// unarchive
    Unarchive,
    /// delete
    Delete,
}

/// The transition table shared by every entity kind
pub const TRANSITION_TABLE: [(Phase, Trigger, Phase); 8] = [
    (Phase::Initial, Trigger::Initial, Phase::Initial),
    (Phase::Initial, Trigger::Ready, Phase::Ready),
    (Phase::Initial, Trigger::Delete, Phase::Deleted),
    (Phase::Ready, Trigger::Initial, Phase::Initial),
    (Phase::Ready, Trigger::Archive, Phase::Archived),
    (Phase::Ready, Trigger::Delete, Phase::Deleted),
    (Phase::Archived, Trigger::Unarchive, Phase::Ready),
    (Phase::Archived, Trigger::Delete, Phase::Deleted),
];

/// Look up the successor of `phase` under `trigger`
pub fn next_phase(phase: Phase, trigger: Trigger) -> Option<Phase> {
    TRANSITION_TABLE
        .iter()
        .find(|(from, on, _)| *from == phase && *on == trigger)
        .map(|(_, _, to)| *to)
}

impl Phase {
    const ALL: [Phase; 4] = [Phase::Initial, Phase::Ready, Phase::Archived, Phase::Deleted];

    fn code(self) -> u8 {
        match self {
            Phase::Initial => 1,
            Phase::Ready => 2,
            Phase::Archived => 3,
            Phase::Deleted => 4,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        Phase::ALL.into_iter().find(|p| p.code() == code)
    }
}

const UNSET: u8 = 0;

/// A named event of one lifecycle family
pub trait LifecycleEvent: TransitionInput + Copy + PartialEq + Eq + 'static {
    /// Position of this event in the shared table
    fn trigger(self) -> Trigger;

    /// Family-specific event for a table trigger
    fn from_trigger(trigger: Trigger) -> Self;

    /// Event name as published in state change events
    fn name(self) -> &'static str;
}

/// A named state of one lifecycle family
pub trait LifecycleState: State + Copy + 'static {
    /// Events of the same family
    type Event: LifecycleEvent;

    /// Position of this state in the shared table
    fn phase(self) -> Phase;

    /// Family-specific state for a table phase
    fn from_phase(phase: Phase) -> Self;

    /// All state names of the family, in table order
    fn names() -> Vec<&'static str> {
        Phase::ALL.into_iter().map(|p| Self::from_phase(p).name()).collect()
    }
}

impl<S: LifecycleState> MealyStateTransitions for S {
    type Input = S::Event;

    fn can_transition_to(&self, target: &Self, input: &Self::Input) -> bool {
        next_phase(self.phase(), input.trigger()) == Some(target.phase())
    }

    fn valid_transitions(&self, input: &Self::Input) -> Vec<Self> {
        next_phase(self.phase(), input.trigger())
            .map(S::from_phase)
            .into_iter()
            .collect()
    }
}

/// States of data models, data objects and data elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelState {
    /// Defined but not usable yet
    Initial,
    /// Usable; instances may be created
    Ready,
    /// Retired, may be restored
    Archived,
    /// Terminal
    Deleted,
}

/// Events of data models, data objects and data elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelEvent {
    /// Back to (or stay in) INITIAL
    Initial,
    /// Become READY
    Ready,
    /// Archive
    Archive,
    /// Restore from ARCHIVED
    Unarchive,
    /// Delete
    Delete,
}

/// States of data object instances, data element instances and data values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceState {
    /// Created without data
    Created,
    /// Holds data
    Initialized,
    /// Retired, may be restored
    Archived,
    /// Terminal
    Deleted,
}

/// Events of data object instances, data element instances and data values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceEvent {
    /// Back to (or stay in) CREATED
    Create,
    /// Become INITIALIZED
    Initialize,
    /// Archive
    Archive,
    /// Restore from ARCHIVED
    Unarchive,
    /// Delete
    Delete,
}

impl State for ModelState {
    fn name(&self) -> &'static str {
        match self {
            ModelState::Initial => "INITIAL",
            ModelState::Ready => "READY",
            ModelState::Archived => "ARCHIVED",
            ModelState::Deleted => "DELETED",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, ModelState::Deleted)
    }
}

impl State for InstanceState {
    fn name(&self) -> &'static str {
        match self {
            InstanceState::Created => "CREATED",
            InstanceState::Initialized => "INITIALIZED",
            InstanceState::Archived => "ARCHIVED",
            InstanceState::Deleted => "DELETED",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, InstanceState::Deleted)
    }
}

impl LifecycleState for ModelState {
    type Event = ModelEvent;

    fn phase(self) -> Phase {
        match self {
            ModelState::Initial => Phase::Initial,
            ModelState::Ready => Phase::Ready,
            ModelState::Archived => Phase::Archived,
            ModelState::Deleted => Phase::Deleted,
        }
    }

    fn from_phase(phase: Phase) -> Self {
        match phase {
            Phase::Initial => ModelState::Initial,
            Phase::Ready => ModelState::Ready,
            Phase::Archived => ModelState::Archived,
            Phase::Deleted => ModelState::Deleted,
        }
    }
}

impl LifecycleState for InstanceState {
    type Event = InstanceEvent;

    fn phase(self) -> Phase {
        match self {
            InstanceState::Created => Phase::Initial,
            InstanceState::Initialized => Phase::Ready,
            InstanceState::Archived => Phase::Archived,
            InstanceState::Deleted => Phase::Deleted,
        }
    }

    fn from_phase(phase: Phase) -> Self {
        match phase {
            Phase::Initial => InstanceState::Created,
            Phase::Ready => InstanceState::Initialized,
            Phase::Archived => InstanceState::Archived,
            Phase::Deleted => InstanceState::Deleted,
        }
    }
}

impl TransitionInput for ModelEvent {
    fn description(&self) -> String {
        self.name().to_string()
    }
}

impl TransitionInput for InstanceEvent {
    fn description(&self) -> String {
        self.name().to_string()
    }
}

impl LifecycleEvent for ModelEvent {
    fn trigger(self) -> Trigger {
        match self {
            ModelEvent::Initial => Trigger::Initial,
            ModelEvent::Ready => Trigger::Ready,
            ModelEvent::Archive => Trigger::Archive,
            ModelEvent::Unarchive => Trigger::Unarchive,
            ModelEvent::Delete => Trigger::Delete,
        }
    }

    fn from_trigger(trigger: Trigger) -> Self {
        match trigger {
            Trigger::Initial => ModelEvent::Initial,
            Trigger::Ready => ModelEvent::Ready,
            Trigger::Archive => ModelEvent::Archive,
            Trigger::Unarchive => ModelEvent::Unarchive,
            Trigger::Delete => ModelEvent::Delete,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ModelEvent::Initial => "initial",
            ModelEvent::Ready => "ready",
            ModelEvent::Archive => "archive",
            ModelEvent::Unarchive => "unarchive",
            ModelEvent::Delete => "delete",
        }
    }
}

impl LifecycleEvent for InstanceEvent {
    fn trigger(self) -> Trigger {
        match self {
            InstanceEvent::Create => Trigger::Initial,
            InstanceEvent::Initialize => Trigger::Ready,
            InstanceEvent::Archive => Trigger::Archive,
            InstanceEvent::Unarchive => Trigger::Unarchive,
            InstanceEvent::Delete => Trigger::Delete,
        }
    }

    fn from_trigger(trigger: Trigger) -> Self {
        match trigger {
            Trigger::Initial => InstanceEvent::Create,
            Trigger::Ready => InstanceEvent::Initialize,
            Trigger::Archive => InstanceEvent::Archive,
            Trigger::Unarchive => InstanceEvent::Unarchive,
            Trigger::Delete => InstanceEvent::Delete,
        }
    }

    fn name(self) -> &'static str {
        match self {
            InstanceEvent::Create => "create",
            InstanceEvent::Initialize => "initialize",
            InstanceEvent::Archive => "archive",
            InstanceEvent::Unarchive => "unarchive",
            InstanceEvent::Delete => "delete",
        }
    }
}

/// Who a transition is applied to, and where its event goes
pub struct TransitionSubject<'a> {
    /// Bus receiving the state change event
    pub bus: &'a EventBus,
    /// Kind of the entity
    pub model_class: ModelClass,
    /// Identifier of the entity
    pub identifier: String,
    /// The entity itself, attached to the event
    pub source: Option<EventSource>,
}

/// Per-entity lifecycle driver
///
/// State is only ever written through [`LifecycleMachine::initialize`] and
/// [`LifecycleMachine::trigger`].
#[derive(Debug)]
pub struct LifecycleMachine<S: LifecycleState> {
    state: AtomicU8,
    max_retries: u32,
    _phantom: PhantomData<fn() -> S>,
}

impl<S: LifecycleState> LifecycleMachine<S> {
    /// Create a machine with no state set yet
    pub fn new(max_retries: u32) -> Self {
        Self {
            state: AtomicU8::new(UNSET),
            max_retries,
            _phantom: PhantomData,
        }
    }

    /// Current state, `None` before [`initialize`](Self::initialize)
    pub fn current(&self) -> Option<S> {
        Phase::from_code(self.state.load(Ordering::Acquire)).map(S::from_phase)
    }

    /// Check if in a specific state
    pub fn is_in_state(&self, state: S) -> bool {
        self.current() == Some(state)
    }

    /// Fire the initial event once if no state is set yet
    ///
    /// Returns `false`, without side effects, when the lifecycle already
    /// started.
    pub fn initialize(&self, subject: &TransitionSubject<'_>) -> bool {
        let initial = S::from_phase(Phase::Initial);
        let swapped = self
            .state
            .compare_exchange(
                UNSET,
                Phase::Initial.code(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if swapped {
            self.record(subject, None, initial, S::Event::from_trigger(Trigger::Initial));
        }
        swapped
    }

    /// Apply `event` to the current state
    ///
    /// On success the new state is stored, the transition is logged and a
    /// state change event is fired on the subject's bus. The
    /// INITIAL --initial--> INITIAL self-loop returns without side effects.
    pub fn trigger(&self, subject: &TransitionSubject<'_>, event: S::Event) -> TradeResult<S> {
        let attempts = self.max_retries.saturating_add(1);
        for _ in 0..attempts {
            let raw = self.state.load(Ordering::Acquire);
            let current = Phase::from_code(raw)
                .map(S::from_phase)
                .ok_or_else(|| illegal_transition(subject, None::<S>, event))?;
            let next = next_phase(current.phase(), event.trigger())
                .map(S::from_phase)
                .ok_or_else(|| illegal_transition(subject, Some(current), event))?;
            if next == current {
                return Ok(current);
            }
            if self
                .state
                .compare_exchange(raw, next.phase().code(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.record(subject, Some(current), next, event);
                return Ok(next);
            }
            std::thread::yield_now();
        }

        error!(
            model_class = %subject.model_class,
            identifier = %subject.identifier,
            event = event.name(),
            attempts,
            "lifecycle transition abandoned after contended retries"
        );
        Err(TradeError::TransitionContention {
            identifier: subject.identifier.clone(),
            event: event.name().to_string(),
            attempts,
        })
    }

    fn record(&self, subject: &TransitionSubject<'_>, old: Option<S>, new: S, event: S::Event) {
        debug!(
            model_class = %subject.model_class,
            identifier = %subject.identifier,
            event = event.name(),
            old_state = old.map(|s| s.name()).unwrap_or("<unset>"),
            new_state = new.name(),
            "lifecycle transition"
        );
        subject.bus.fire_event(&TradeEvent::state_change(
            subject.model_class,
            subject.identifier.clone(),
            subject.source.clone(),
            old.map(|s| s.name()),
            new.name(),
            event.name(),
        ));
    }
}

fn illegal_transition<S: LifecycleState>(
    subject: &TransitionSubject<'_>,
    current: Option<S>,
    event: S::Event,
) -> TradeError {
    TradeError::IllegalTransition {
        model_class: subject.model_class.to_string(),
        identifier: subject.identifier.clone(),
        state: current.map(|s| s.name()).unwrap_or("<unset>").to_string(),
        event: event.name().to_string(),
    }
}
