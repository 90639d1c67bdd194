// Public verb API.
//
// User programs drive the sim through these methods. Each verb wraps a
// `CommandAction` in a `Command` and pushes it onto the queue of every
// entity the `Target` resolves to:
//
//   Target::All          every live entity (broadcast)
//   Target::Type(tag)    every entity of that type
//   Target::Entity(id)   just that entity
//
// Resolution happens once, at issue time. Entities spawned afterwards do
// not receive earlier broadcasts. World-level verbs (`play_sound`,
// `add_score`, day/night, spawning) go to the global queue instead.
//
// Inside a code block, `Target::this(me)` names the entity the block is
// running for. Commands issued while that entity's queue is in insert mode
// (the body of `if_block_ahead`) land in the nested queue.
//
// High-priority pushes bracket verbs so they run before anything already
// queued on the targets, in the order issued. Event reactions use this:
//
//   ctl.when(EventType::WhenTouched, Some("creeper"), |ctl, event| {
//       let me = Target::this(event.target_identifier.as_ref());
//       ctl.with_high_priority(&me, |ctl| {
//           ctl.flash(me.clone());
//           ctl.explode(me.clone());
//       });
//   });
//
// `with_highlight` works the same way for UI feedback: commands issued
// inside it carry a code-block id that is highlighted when they begin.
//
// See also: `actions.rs` for what each verb does when it runs,
// `command_queue.rs` for insert mode and priority staging.

use crate::command::{CodeBlock, Command, CommandAction};
use crate::controller::GameController;
use crate::types::{EntityId, FacingDirection, Position, TurnDirection};
use log::warn;
use std::rc::Rc;

/// Which entities a verb applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    All,
    Type(String),
    Entity(EntityId),
}

impl Target {
    pub fn of_type(entity_type: impl Into<String>) -> Self {
        Target::Type(entity_type.into())
    }

    /// The entity a code block runs for, or everyone when it runs on the
    /// global queue.
    pub fn this(me: Option<&EntityId>) -> Self {
        me.map_or(Target::All, |id| Target::Entity(id.clone()))
    }
}

impl From<EntityId> for Target {
    fn from(id: EntityId) -> Self {
        Target::Entity(id)
    }
}

impl From<&EntityId> for Target {
    fn from(id: &EntityId) -> Self {
        Target::Entity(id.clone())
    }
}

fn code(body: impl Fn(&mut GameController, Option<&EntityId>) + 'static) -> CodeBlock {
    Rc::new(body)
}

impl GameController {
    /// Entities `target` names right now.
    pub fn resolve_target(&self, target: &Target) -> Vec<EntityId> {
        match target {
            Target::All => self.level.entity_ids(),
            Target::Type(entity_type) => self
                .level
                .entities_of_type(entity_type)
                .map(|e| e.identifier.clone())
                .collect(),
            Target::Entity(id) => {
                if self.level.entity(id).is_some() {
                    vec![id.clone()]
                } else {
                    warn!("no entity {id} to command");
                    Vec::new()
                }
            }
        }
    }

    /// Queues `action` on every resolved entity. Returns how many commands
    /// were queued.
    fn issue(&mut self, target: impl Into<Target>, action: CommandAction) -> usize {
        let ids = self.resolve_target(&target.into());
        ids.into_iter()
            .filter(|id| self.add_command(Command::new(Some(id.clone()), action.clone())))
            .count()
    }

    fn issue_global(&mut self, action: CommandAction) {
        self.add_command(Command::new(None, action));
    }

    // -----------------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------------

    pub fn move_forward(&mut self, target: impl Into<Target>) -> usize {
        self.issue(target, CommandAction::MoveForward)
    }

    pub fn move_backward(&mut self, target: impl Into<Target>) -> usize {
        self.issue(target, CommandAction::MoveBackward)
    }

    /// Face `direction`, then step.
    pub fn move_direction(&mut self, target: impl Into<Target>, direction: FacingDirection) -> usize {
        self.issue(target, CommandAction::MoveDirection(direction))
    }

    pub fn move_away(&mut self, target: impl Into<Target>, from: &EntityId) -> usize {
        self.issue(target, CommandAction::MoveAway(from.clone()))
    }

    pub fn move_toward(&mut self, target: impl Into<Target>, toward: &EntityId) -> usize {
        self.issue(target, CommandAction::MoveToward(toward.clone()))
    }

    pub fn move_random(&mut self, target: impl Into<Target>) -> usize {
        self.issue(target, CommandAction::MoveRandom)
    }

    pub fn turn_left(&mut self, target: impl Into<Target>) -> usize {
        self.issue(target, CommandAction::Turn(TurnDirection::Left))
    }

    pub fn turn_right(&mut self, target: impl Into<Target>) -> usize {
        self.issue(target, CommandAction::Turn(TurnDirection::Right))
    }

    pub fn turn_random(&mut self, target: impl Into<Target>) -> usize {
        self.issue(target, CommandAction::TurnRandom)
    }

    // -----------------------------------------------------------------------
    // World edits
    // -----------------------------------------------------------------------

    /// Place under the entity's own cell.
    pub fn place_block(&mut self, target: impl Into<Target>, block_type: &str) -> usize {
        self.issue(target, CommandAction::PlaceBlock(block_type.to_string()))
    }

    pub fn place_direction(&mut self, target: impl Into<Target>, block_type: &str, direction: FacingDirection) -> usize {
        self.issue(target, CommandAction::PlaceDirection(block_type.to_string(), direction))
    }

    pub fn place_in_front(&mut self, target: impl Into<Target>, block_type: &str) -> usize {
        self.issue(target, CommandAction::PlaceInFront(block_type.to_string()))
    }

    pub fn till_soil(&mut self, target: impl Into<Target>) -> usize {
        self.issue(target, CommandAction::TillSoil)
    }

    pub fn destroy_block(&mut self, target: impl Into<Target>) -> usize {
        self.issue(target, CommandAction::DestroyBlock)
    }

    /// `use` on the cell ahead.
    pub fn use_in_front(&mut self, target: impl Into<Target>) -> usize {
        self.issue(target, CommandAction::Use)
    }

    pub fn attack(&mut self, target: impl Into<Target>) -> usize {
        self.issue(target, CommandAction::Attack)
    }

    pub fn drop(&mut self, target: impl Into<Target>, item: &str) -> usize {
        self.issue(target, CommandAction::Drop(item.to_string()))
    }

    pub fn wait(&mut self, target: impl Into<Target>, ticks: u32) -> usize {
        self.issue(target, CommandAction::Wait(ticks))
    }

    pub fn flash(&mut self, target: impl Into<Target>) -> usize {
        self.issue(target, CommandAction::Flash)
    }

    pub fn explode(&mut self, target: impl Into<Target>) -> usize {
        self.issue(target, CommandAction::Explode)
    }

    pub fn destroy_entity(&mut self, target: impl Into<Target>) -> usize {
        self.issue(target, CommandAction::DestroyEntity)
    }

    // -----------------------------------------------------------------------
    // Control flow
    // -----------------------------------------------------------------------

    /// Runs `body` into a nested queue when the block ahead is
    /// `block_type`; the command finishes once that queue drains.
    pub fn if_block_ahead(
        &mut self,
        target: impl Into<Target>,
        block_type: &str,
        body: impl Fn(&mut GameController, Option<&EntityId>) + 'static,
    ) -> usize {
        let action = CommandAction::IfBlockAhead {
            block_type: block_type.to_string(),
            code: code(body),
        };
        self.issue(target, action)
    }

    /// Re-runs `body` each time the queue goes idle, `iterations` times.
    pub fn repeat(
        &mut self,
        target: impl Into<Target>,
        iterations: i32,
        body: impl Fn(&mut GameController, Option<&EntityId>) + 'static,
    ) -> usize {
        let action = CommandAction::Repeat {
            code: code(body),
            iterations,
        };
        self.issue(target, action)
    }

    pub fn repeat_forever(
        &mut self,
        target: impl Into<Target>,
        body: impl Fn(&mut GameController, Option<&EntityId>) + 'static,
    ) -> usize {
        self.repeat(target, -1, body)
    }

    /// Like `repeat`, with the count drawn from `repeat_random_range`.
    pub fn repeat_random(
        &mut self,
        target: impl Into<Target>,
        body: impl Fn(&mut GameController, Option<&EntityId>) + 'static,
    ) -> usize {
        self.issue(target, CommandAction::RepeatRandom(code(body)))
    }

    // -----------------------------------------------------------------------
    // Global verbs
    // -----------------------------------------------------------------------

    pub fn play_sound(&mut self, sound: &str) {
        self.issue_global(CommandAction::PlaySound(sound.to_string()));
    }

    pub fn add_score(&mut self, amount: i64) {
        self.issue_global(CommandAction::AddScore(amount));
    }

    pub fn start_day(&mut self) {
        self.issue_global(CommandAction::StartDay);
    }

    pub fn start_night(&mut self) {
        self.issue_global(CommandAction::StartNight);
    }

    pub fn queue_day_night_cycle(&mut self, first_delay_ticks: u64, period_ticks: u64, start_day: bool) {
        self.issue_global(CommandAction::SetDayNightCycle {
            first_delay_ticks,
            period_ticks,
            start_day,
        });
    }

    /// Spawns at a random empty cell.
    pub fn spawn_entity(&mut self, entity_type: &str, facing: FacingDirection) {
        self.issue_global(CommandAction::SpawnEntity(entity_type.to_string(), facing));
    }

    pub fn spawn_entity_at(&mut self, entity_type: &str, position: Position, facing: FacingDirection) {
        self.issue_global(CommandAction::SpawnEntityAt(entity_type.to_string(), position, facing));
    }

    // -----------------------------------------------------------------------
    // Priority
    // -----------------------------------------------------------------------

    pub fn start_push_high_priority(&mut self, target: &Target) {
        for id in self.resolve_target(target) {
            if let Some(queue) = self.entity_queue_mut(&id) {
                queue.start_push_high_priority_commands();
            }
        }
    }

    pub fn end_push_high_priority(&mut self, target: &Target) {
        for id in self.resolve_target(target) {
            if let Some(queue) = self.entity_queue_mut(&id) {
                queue.end_push_high_priority_commands();
            }
        }
    }

    /// Verbs issued inside `f` run ahead of what `target` already has
    /// queued.
    pub fn with_high_priority(&mut self, target: &Target, f: impl FnOnce(&mut GameController)) {
        self.start_push_high_priority(target);
        f(self);
        self.end_push_high_priority(target);
    }

    /// Commands issued inside `f` ask the presentation layer to highlight
    /// `block_id` when they begin. Nests; the innermost id wins.
    pub fn with_highlight(&mut self, block_id: impl Into<String>, f: impl FnOnce(&mut GameController)) {
        let outer = self.highlight_block.replace(block_id.into());
        f(self);
        self.highlight_block = outer;
    }
}
