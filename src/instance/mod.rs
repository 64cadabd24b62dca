// Copyright 2025 Cowboy AI, LLC.

//! Runtime occurrences of data definitions and the values backing them
//!
//! State flows upwards: a [`DataValue`] gaining or losing data moves every
//! associated [`DataElementInstance`] between CREATED and INITIALIZED, and
//! each of those re-evaluates its owning [`DataObjectInstance`]. Every step
//! is an independent transition; a cascade that fails midway stays partially
//! applied.

mod data_element_instance;
mod data_object_instance;
mod data_value;

pub use data_element_instance::DataElementInstance;
pub use data_object_instance::DataObjectInstance;
pub use data_value::DataValue;

use crate::errors::{TradeError, TradeResult};
use crate::state_machine::{InstanceEvent, InstanceState, LifecycleMachine, TransitionSubject};

/// Move a CREATED/INITIALIZED machine towards `initialized`
///
/// Other states are left alone. A concurrent caller reaching the same target
/// first is not an error.
pub(crate) fn settle(
    machine: &LifecycleMachine<InstanceState>,
    subject: &TransitionSubject<'_>,
    initialized: bool,
) -> TradeResult<()> {
    let target = if initialized {
        InstanceState::Initialized
    } else {
        InstanceState::Created
    };
    let event = match (machine.current(), initialized) {
        (Some(InstanceState::Created), true) => InstanceEvent::Initialize,
        (Some(InstanceState::Initialized), false) => InstanceEvent::Create,
        _ => return Ok(()),
    };
    match machine.trigger(subject, event) {
        Ok(_) => Ok(()),
        Err(TradeError::IllegalTransition { .. }) if machine.is_in_state(target) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Instance states that accept new data or associations
pub(crate) fn is_live(state: InstanceState) -> bool {
    matches!(state, InstanceState::Created | InstanceState::Initialized)
}
