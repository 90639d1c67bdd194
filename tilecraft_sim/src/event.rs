// Gameplay events and listeners.
//
// The controller dispatches a `GameEvent` to every registered listener;
// there is no dispatch table. Listeners decide for themselves whether an
// event concerns them (`GameEvent::matches` helps). A listener runs with
// full access to the controller and typically queues reactive commands,
// often with high priority so they run before anything already queued.
//
// Per-entity events carry the entity they happened to (`target_identifier`,
// `target_type`) and, where it applies, the entity that caused them
// (`triggered_by`). `WhenDayGlobal`, `WhenNightGlobal`, and `WhenRun` are
// sent once with no target.
//
// See also: `controller.rs` (`dispatch_event`, `add_event_listener`).

use crate::controller::GameController;
use crate::types::EntityId;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Another entity bumped into this one.
    WhenTouched,
    WhenUsed,
    WhenSpawned,
    WhenAttacked,
    WhenDay,
    WhenNight,
    WhenDayGlobal,
    WhenNightGlobal,
    /// The attempt started.
    WhenRun,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    pub event_type: EventType,
    pub target_identifier: Option<EntityId>,
    pub target_type: Option<String>,
    pub triggered_by: Option<EntityId>,
}

impl GameEvent {
    pub fn global(event_type: EventType) -> Self {
        Self {
            event_type,
            target_identifier: None,
            target_type: None,
            triggered_by: None,
        }
    }

    pub fn for_entity(event_type: EventType, target: &EntityId, target_type: &str) -> Self {
        Self {
            event_type,
            target_identifier: Some(target.clone()),
            target_type: Some(target_type.to_string()),
            triggered_by: None,
        }
    }

    pub fn triggered_by(mut self, by: &EntityId) -> Self {
        self.triggered_by = Some(by.clone());
        self
    }

    /// Same event type, and (if given) the same target type.
    pub fn matches(&self, event_type: EventType, target_type: Option<&str>) -> bool {
        self.event_type == event_type
            && target_type.is_none_or(|t| self.target_type.as_deref() == Some(t))
    }
}

/// A registered reaction.
pub type EventListener = Rc<dyn Fn(&mut GameController, &GameEvent)>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_filters_by_type_and_target() {
        let event = GameEvent::for_entity(EventType::WhenTouched, &EntityId::new("sheep0"), "sheep")
            .triggered_by(&EntityId::player());
        assert!(event.matches(EventType::WhenTouched, Some("sheep")));
        assert!(event.matches(EventType::WhenTouched, None));
        assert!(!event.matches(EventType::WhenTouched, Some("cow")));
        assert!(!event.matches(EventType::WhenUsed, Some("sheep")));
        assert_eq!(event.triggered_by, Some(EntityId::player()));

        let run = GameEvent::global(EventType::WhenRun);
        assert!(run.matches(EventType::WhenRun, None));
        assert!(!run.matches(EventType::WhenRun, Some("sheep")));
    }
}
