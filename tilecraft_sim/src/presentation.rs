// Contract with the presentation layer.
//
// The sim never renders. It emits `PresentationRequest`s into the
// controller's outbox, and a renderer drains them with
// `GameController::drain_presentation`. Requests that gate gameplay are
// animations: each carries an `AnimationTicket`, and the command that
// issued it stays `Working` until the renderer reports the ticket back
// through `GameController::complete_animation`. Every ticket must be
// completed exactly once; a completed ticket whose command is gone (the
// entity was destroyed, the attempt was reset) is ignored.
//
// `HeadlessPresenter` is the renderer-free implementation used by tests and
// batch runs: it completes every ticket after a fixed number of pumps.
//
// See also: `controller.rs` (outbox, ticket bookkeeping), `actions.rs`
// where animations are requested.

use crate::command::Hazard;
use crate::config::{GameConfig, SpecialLevelType};
use crate::controller::GameController;
use crate::plane::PlaneType;
use crate::types::{EntityId, FacingDirection, Position};
use serde::{Deserialize, Serialize};

/// Handle for one in-flight animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnimationTicket(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimationKind {
    Walk,
    /// Face-only nudge against something that blocks.
    Bump,
    Turn,
    PlaceBlock,
    DestroyBlock,
    TillSoil,
    Use,
    Attack,
    Drop,
    Flash,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationRequest {
    pub entity: Option<EntityId>,
    pub kind: AnimationKind,
    pub position: Position,
    pub facing: FacingDirection,
}

/// End-of-level sequence, picked by the level's special type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndAnimation {
    Celebrate,
    Fail,
    MinecartRide,
    HouseReveal,
    AgentSpawn,
    /// Freeplay levels end without a sequence.
    None,
}

impl EndAnimation {
    pub fn select(special: Option<SpecialLevelType>, success: bool) -> Self {
        match (special, success) {
            (Some(SpecialLevelType::Freeplay), _) => EndAnimation::None,
            (_, false) => EndAnimation::Fail,
            (Some(SpecialLevelType::Minecart), true) => EndAnimation::MinecartRide,
            (Some(SpecialLevelType::HouseBuild), true) => EndAnimation::HouseReveal,
            (Some(SpecialLevelType::AgentSpawn), true) => EndAnimation::AgentSpawn,
            (None, true) => EndAnimation::Celebrate,
        }
    }
}

/// Everything the sim asks of the renderer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentationRequest {
    /// Must be answered with `complete_animation(ticket)`.
    Animation {
        ticket: AnimationTicket,
        request: AnimationRequest,
    },
    Sound(String),
    /// Code-block highlight for the command that just began.
    Highlight(String),
    /// The cell the player would act on next.
    SelectionIndicator { entity: EntityId, position: Position },
    RefreshBlock { plane: PlaneType, position: Position },
    DoorAnimation { position: Position, open: bool },
    ConduitAnimation { position: Position, active: bool },
    Explosion(Position),
    DayNight { is_daytime: bool },
    EntitySpawned { entity: EntityId, position: Position },
    EntityDestroyed(EntityId),
    HazardDeath { entity: EntityId, hazard: Hazard },
    LevelEnd { success: bool, animation: EndAnimation },
}

// ---------------------------------------------------------------------------
// Headless presenter
// ---------------------------------------------------------------------------

/// Completes animation tickets after `delay` pumps, without drawing
/// anything. Keeps every request it saw for inspection.
#[derive(Debug, Default)]
pub struct HeadlessPresenter {
    delay: u32,
    in_flight: Vec<(AnimationTicket, u32)>,
    history: Vec<PresentationRequest>,
}

impl HeadlessPresenter {
    pub fn new(delay: u32) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(config.animation_duration_ticks)
    }

    /// Takes new requests from the controller and completes any tickets
    /// that are due.
    pub fn pump(&mut self, controller: &mut GameController) {
        for request in controller.drain_presentation() {
            if let PresentationRequest::Animation { ticket, .. } = &request {
                self.in_flight.push((*ticket, self.delay));
            }
            self.history.push(request);
        }
        let mut due = Vec::new();
        self.in_flight.retain_mut(|(ticket, remaining)| {
            if *remaining == 0 {
                due.push(*ticket);
                false
            } else {
                *remaining -= 1;
                true
            }
        });
        for ticket in due {
            controller.complete_animation(ticket);
        }
    }

    pub fn history(&self) -> &[PresentationRequest] {
        &self.history
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Ticks and pumps until the attempt resolves or `max_ticks` pass.
    pub fn run_attempt(&mut self, controller: &mut GameController, max_ticks: u64) -> Option<bool> {
        for _ in 0..max_ticks {
            controller.tick();
            self.pump(controller);
            if let Some(result) = controller.attempt_result() {
                return Some(result);
            }
        }
        controller.attempt_result()
    }
}
