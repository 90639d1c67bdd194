// Verb execution.
//
// `GameController::execute` is called once when a command begins. It
// mutates the world immediately and returns a `Step` telling the tick loop
// how the command finishes: right away, after an animation ticket, after a
// tick countdown, or once its nested queue drains.
//
// Movement mutates before animating: the entity is already on the target
// cell while the walk animation plays. A move that carries a hazard (water
// or lava under procedural control) walks in and then dies when the
// animation completes.
//
// Bumps. A move stopped by terrain plays a bump; for the player or agent it
// fails the command, for mobs it succeeds. A move stopped by another entity
// tells that entity `WhenTouched` and succeeds.
//
// `moveAway`/`moveToward` take one greedy step. Candidates are picked axis
// by axis, horizontal first: toward (or away from) the other entity on each
// axis where they differ, and for `moveAway` both ways along an axis where
// they are level. Among the safe legal candidates the one that most
// increases (or decreases) squared distance wins, strictly improving on
// staying put; ties keep the earlier candidate. No such step, or already
// adjacent when moving toward, is a bump.
//
// See also: `controller.rs` for the tick loop that calls in here,
// `level.rs` for the legality checks and world edits.

use crate::block::LevelBlock;
use crate::command::{AfterAnimation, CodeBlock, CommandAction};
use crate::command_queue::CommandQueue;
use crate::controller::{GameController, QueuePath, Step};
use crate::event::EventType;
use crate::level::MoveCheck;
use crate::plane::PlaneType;
use crate::presentation::{AnimationKind, AnimationRequest, PresentationRequest};
use crate::types::{EntityId, FacingDirection, Position, TurnDirection};
use log::warn;
use smallvec::SmallVec;

/// Step directions worth scoring for `moveToward`/`moveAway`.
fn relative_candidates(from: Position, reference: Position, away: bool) -> SmallVec<[FacingDirection; 4]> {
    let axes = [
        (reference.x - from.x, FacingDirection::East, FacingDirection::West),
        (reference.y - from.y, FacingDirection::South, FacingDirection::North),
    ];
    let mut out = SmallVec::new();
    for (delta, positive, negative) in axes {
        match (delta.signum(), away) {
            (1, false) | (-1, true) => out.push(positive),
            (-1, false) | (1, true) => out.push(negative),
            (0, true) => {
                out.push(positive);
                out.push(negative);
            }
            _ => {}
        }
    }
    out
}

fn chebyshev(a: Position, b: Position) -> i32 {
    (a.x - b.x).abs().max((a.y - b.y).abs())
}

impl GameController {
    pub(crate) fn execute(&mut self, path: &QueuePath, action: &CommandAction) -> Step {
        match action {
            CommandAction::PlaySound(name) => {
                self.present(PresentationRequest::Sound(name.clone()));
                Step::Done(true)
            }
            CommandAction::AddScore(amount) => {
                self.level.add_score(*amount);
                Step::Done(true)
            }
            CommandAction::StartDay => {
                self.set_daytime(true);
                Step::Done(true)
            }
            CommandAction::StartNight => {
                self.set_daytime(false);
                Step::Done(true)
            }
            CommandAction::SetDayNightCycle {
                first_delay_ticks,
                period_ticks,
                start_day,
            } => {
                self.set_day_night_cycle(*first_delay_ticks, *period_ticks, *start_day);
                Step::Done(true)
            }
            CommandAction::SpawnEntity(entity_type, facing) => {
                match self.level.random_empty_position(&mut self.rng) {
                    Some(position) => self.spawn_at(entity_type, position, *facing),
                    None => {
                        warn!("no free cell to spawn {entity_type:?}");
                        Step::Done(false)
                    }
                }
            }
            CommandAction::SpawnEntityAt(entity_type, position, facing) => {
                self.spawn_at(entity_type, *position, *facing)
            }
            CommandAction::Repeat { code, iterations } => {
                if let Some(queue) = self.queue_mut(path) {
                    queue.add_repeat_command(code.clone(), *iterations);
                }
                Step::Done(true)
            }
            CommandAction::RepeatRandom(code) => {
                let (low, high) = self.game_config().repeat_random_range;
                let iterations = self.rng.range_i32_inclusive(low, high);
                if let Some(queue) = self.queue_mut(path) {
                    queue.add_repeat_command(code.clone(), iterations);
                }
                Step::Done(true)
            }
            _ => {
                let Some(id) = path.entity().cloned() else {
                    warn!("{action:?} issued without an entity");
                    return Step::Done(false);
                };
                if self.level.entity(&id).is_none() {
                    return Step::Done(false);
                }
                self.execute_as(path, &id, action)
            }
        }
    }

    fn execute_as(&mut self, path: &QueuePath, id: &EntityId, action: &CommandAction) -> Step {
        match action {
            CommandAction::MoveForward => {
                let check = self.level.can_move_forward(id);
                self.step_move(id, check)
            }
            CommandAction::MoveBackward => {
                let check = self.level.can_move_backward(id);
                self.step_move(id, check)
            }
            CommandAction::MoveDirection(direction) => {
                self.face(id, *direction);
                let check = self.level.can_move_forward(id);
                self.step_move(id, check)
            }
            CommandAction::MoveAway(other) => self.move_relative(id, other, true),
            CommandAction::MoveToward(other) => self.move_relative(id, other, false),
            CommandAction::MoveRandom => {
                let direction = self
                    .rng
                    .choose(&FacingDirection::ALL)
                    .copied()
                    .unwrap_or(FacingDirection::North);
                self.face(id, direction);
                match self.level.can_move_forward(id) {
                    Some(check) if check.allowed && check.hazard.is_none() => self.step_move(id, Some(check)),
                    _ => self.bump(id, false),
                }
            }
            CommandAction::Turn(turn) => {
                self.turn(id, *turn);
                Step::Await(self.animation(id, AnimationKind::Turn), AfterAnimation::Succeed)
            }
            CommandAction::TurnRandom => {
                let turn = if self.rng.chance(0.5) {
                    TurnDirection::Left
                } else {
                    TurnDirection::Right
                };
                self.turn(id, turn);
                Step::Await(self.animation(id, AnimationKind::Turn), AfterAnimation::Succeed)
            }
            CommandAction::PlaceBlock(block_type) => match self.level.entity(id).map(|e| e.position) {
                Some(position) => self.place_at(id, block_type, position),
                None => Step::Done(false),
            },
            CommandAction::PlaceDirection(block_type, direction) => {
                self.face(id, *direction);
                match self.front(id) {
                    Some(front) => self.place_at(id, block_type, front),
                    None => Step::Done(false),
                }
            }
            CommandAction::PlaceInFront(block_type) => match self.front(id) {
                Some(front) => self.place_at(id, block_type, front),
                None => Step::Done(false),
            },
            CommandAction::TillSoil => {
                if self.front(id).is_some_and(|front| self.level.till_soil(front)) {
                    Step::Await(self.animation(id, AnimationKind::TillSoil), AfterAnimation::Succeed)
                } else {
                    self.bump(id, true)
                }
            }
            CommandAction::DestroyBlock => {
                let destroyed = self.front(id).and_then(|front| self.level.destroy_block(front));
                if destroyed.is_some() {
                    Step::Await(self.animation(id, AnimationKind::DestroyBlock), AfterAnimation::Succeed)
                } else {
                    self.bump(id, true)
                }
            }
            CommandAction::Use => self.use_front(id),
            CommandAction::Attack => self.attack_front(id),
            CommandAction::Drop(item) => self.drop_item(id, item),
            CommandAction::Wait(ticks) => Step::Wait(*ticks),
            CommandAction::DestroyEntity => {
                self.level.destroy_entity(id);
                self.present(PresentationRequest::EntityDestroyed(id.clone()));
                Step::Done(true)
            }
            CommandAction::IfBlockAhead { block_type, code } => self.begin_if_block_ahead(path, id, block_type, code),
            CommandAction::Flash => Step::Await(self.animation(id, AnimationKind::Flash), AfterAnimation::Succeed),
            CommandAction::Explode => {
                if let Some(center) = self.level.entity(id).map(|e| e.position) {
                    self.blast(center, Some(id));
                }
                self.level.destroy_entity(id);
                self.present(PresentationRequest::EntityDestroyed(id.clone()));
                Step::Done(true)
            }
            other => {
                warn!("{other:?} is not an entity verb");
                Step::Done(false)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn animation(&self, id: &EntityId, kind: AnimationKind) -> AnimationRequest {
        let (position, facing) = self
            .level
            .entity(id)
            .map_or((Position::default(), FacingDirection::South), |e| (e.position, e.facing));
        AnimationRequest {
            entity: Some(id.clone()),
            kind,
            position,
            facing,
        }
    }

    fn is_controlled(id: &EntityId) -> bool {
        id.as_str() == EntityId::PLAYER || id.as_str() == EntityId::AGENT
    }

    /// Face-only nudge. Fails the command when `fail` is set.
    fn bump(&self, id: &EntityId, fail: bool) -> Step {
        let after = if fail {
            AfterAnimation::Fail
        } else {
            AfterAnimation::Succeed
        };
        Step::Await(self.animation(id, AnimationKind::Bump), after)
    }

    fn face(&mut self, id: &EntityId, direction: FacingDirection) {
        if let Some(entity) = self.level.entity_mut(id) {
            entity.facing = direction;
        }
    }

    fn turn(&mut self, id: &EntityId, turn: TurnDirection) {
        if let Some(entity) = self.level.entity_mut(id) {
            entity.facing = entity.facing.turn(turn);
        }
    }

    fn front(&self, id: &EntityId) -> Option<Position> {
        let entity = self.level.entity(id)?;
        Some(entity.position.forward(entity.facing))
    }

    fn step_move(&mut self, id: &EntityId, check: Option<MoveCheck>) -> Step {
        let Some(check) = check else {
            return Step::Done(false);
        };
        if check.allowed {
            self.level.move_entity(id, &check);
            let after = check.hazard.map_or(AfterAnimation::Succeed, AfterAnimation::Die);
            return Step::Await(self.animation(id, AnimationKind::Walk), after);
        }
        if let Some(other) = &check.blocking_entity {
            self.dispatch_entity_event(EventType::WhenTouched, other, Some(id));
            return self.bump(id, false);
        }
        self.bump(id, Self::is_controlled(id))
    }

    fn move_relative(&mut self, id: &EntityId, other: &EntityId, away: bool) -> Step {
        let Some(from) = self.level.entity(id).map(|e| e.position) else {
            return Step::Done(false);
        };
        let Some(reference) = self.level.entity(other).map(|e| e.position) else {
            warn!("{id} cannot move relative to missing entity {other}");
            return self.bump(id, false);
        };
        if !away && from.is_adjacent(reference) {
            if let Some(direction) = from.direction_to(reference) {
                self.face(id, direction);
            }
            return self.bump(id, false);
        }

        let mut best: Option<(FacingDirection, i64)> = None;
        let current = from.absolute_distance_square(reference);
        for direction in relative_candidates(from, reference, away) {
            let Some(check) = self.level.can_move_direction(id, direction) else {
                continue;
            };
            if !check.allowed || check.hazard.is_some() {
                continue;
            }
            let distance = check.target.absolute_distance_square(reference);
            let bar = best.map_or(current, |(_, d)| d);
            let better = if away { distance > bar } else { distance < bar };
            if better {
                best = Some((direction, distance));
            }
        }
        match best {
            Some((direction, _)) => {
                self.face(id, direction);
                let check = self.level.can_move_forward(id);
                self.step_move(id, check)
            }
            None => self.bump(id, false),
        }
    }

    fn place_at(&mut self, id: &EntityId, block_type: &str, position: Position) -> Step {
        let placement = self.level.can_place_block_at(id, block_type, position);
        if !placement.can_place {
            return self.bump(id, true);
        }
        self.level.place_block(placement.plane, position, block_type);
        Step::Await(self.animation(id, AnimationKind::PlaceBlock), AfterAnimation::Succeed)
    }

    fn use_front(&mut self, id: &EntityId) -> Step {
        let Some(front) = self.front(id) else {
            return Step::Done(false);
        };
        let used = self.level.entities_at(front).map(|e| e.identifier.clone()).next();
        if let Some(other) = used {
            self.dispatch_entity_event(EventType::WhenUsed, &other, Some(id));
        } else if self
            .level
            .block_at(PlaneType::Action, front)
            .is_some_and(LevelBlock::is_explosive)
        {
            self.level.set_block(PlaneType::Action, front, LevelBlock::empty());
            self.blast(front, None);
        } else {
            self.level.toggle_door(front);
        }
        Step::Await(self.animation(id, AnimationKind::Use), AfterAnimation::Succeed)
    }

    fn attack_front(&mut self, id: &EntityId) -> Step {
        let victim = self.front(id).and_then(|front| {
            self.level
                .entities_at(front)
                .find(|e| e.is_alive())
                .map(|e| e.identifier.clone())
        });
        if let Some(victim) = victim {
            let damage = self.game_config().attack_damage;
            let remaining = self.level.damage_entity(&victim, damage);
            self.dispatch_entity_event(EventType::WhenAttacked, &victim, Some(id));
            if remaining.is_some_and(|hp| hp <= 0) {
                self.kill(&victim);
            }
        }
        Step::Await(self.animation(id, AnimationKind::Attack), AfterAnimation::Succeed)
    }

    fn drop_item(&mut self, id: &EntityId, item: &str) -> Step {
        let Some(entity) = self.level.entity_mut(id) else {
            return Step::Done(false);
        };
        if entity.behavior().collects_miniblocks() && !entity.take_from_inventory(item) {
            return self.bump(id, true);
        }
        let position = entity.position;
        self.level.spawn_miniblock(position, item);
        Step::Await(self.animation(id, AnimationKind::Drop), AfterAnimation::Succeed)
    }

    fn kill(&mut self, id: &EntityId) {
        self.level.kill_entity(id);
        if self.level.entity(id).is_none() {
            self.present(PresentationRequest::EntityDestroyed(id.clone()));
        }
    }

    /// Explosion at `center`: clears blocks and hurts every entity in range
    /// except `source`.
    fn blast(&mut self, center: Position, source: Option<&EntityId>) {
        let radius = self.game_config().explosion_radius;
        let damage = self.game_config().attack_damage;
        self.level.explode(center, radius);
        let victims: Vec<EntityId> = self
            .level
            .entities()
            .iter()
            .filter(|e| Some(&e.identifier) != source && chebyshev(e.position, center) <= radius)
            .map(|e| e.identifier.clone())
            .collect();
        for victim in victims {
            if self.level.damage_entity(&victim, damage).is_some_and(|hp| hp <= 0) {
                self.kill(&victim);
            }
        }
    }

    fn spawn_at(&mut self, entity_type: &str, position: Position, facing: FacingDirection) -> Step {
        let Some(id) = self.level.spawn_entity(entity_type, position, facing) else {
            return Step::Done(false);
        };
        self.present(PresentationRequest::EntitySpawned {
            entity: id.clone(),
            position,
        });
        self.dispatch_entity_event(EventType::WhenSpawned, &id, None);
        Step::Done(true)
    }

    /// Tag the entity is looking at: the action block, or the ground when
    /// the action cell is empty.
    fn block_ahead(&self, id: &EntityId) -> Option<String> {
        let front = self.front(id)?;
        let action = self.level.block_at(PlaneType::Action, front)?;
        if !action.is_empty() {
            return Some(action.block_type().to_string());
        }
        self.level
            .block_at(PlaneType::Ground, front)
            .map(|b| b.block_type().to_string())
    }

    fn begin_if_block_ahead(&mut self, path: &QueuePath, id: &EntityId, block_type: &str, code: &CodeBlock) -> Step {
        if self.block_ahead(id).as_deref() != Some(block_type) {
            return Step::Done(true);
        }
        let Some(command) = self.queue_mut(path).and_then(|q| q.current_command_mut()) else {
            return Step::Done(false);
        };
        command.nested = Some(Box::new(CommandQueue::new()));
        self.run_code_into(&path.nested(), code);
        let idle = self
            .queue_mut(path)
            .and_then(|q| q.current_command_mut())
            .and_then(|c| c.nested.as_deref())
            .is_none_or(CommandQueue::is_idle);
        if idle { Step::Done(true) } else { Step::Nested }
    }
}
