// Commands: one queued action for one entity (or for the global queue).
//
// A `Command` pairs a `CommandAction` (the verb and its arguments) with a
// state machine:
//
//   NotStarted --begin--> Working --succeeded--> Success
//                                 --failed-----> Failure
//
// Terminal states are sticky: once a command has succeeded or failed,
// further `succeeded`/`failed` calls are ignored.
//
// While `Working`, a command may be suspended on `pending`: an animation
// ticket issued to the presentation layer (resumed by
// `GameController::complete_animation`), or a tick countdown for `wait`.
// `IfBlockAhead` instead owns a nested `CommandQueue` that the controller
// runs to completion before the command itself settles.
//
// Code blocks (`CodeBlock`) are the callbacks user programs hand to
// control-flow verbs (`ifBlockAhead`, `repeat`) and to `on_finish`. They
// run against the controller with the identifier of the entity they run
// for (`None` on the global queue) and issue more verbs.
//
// See also: `command_queue.rs` which sequences commands, `actions.rs`
// where each `CommandAction` is executed, `verbs.rs` for the public verb
// API that builds commands.

use crate::command_queue::CommandQueue;
use crate::controller::GameController;
use crate::presentation::AnimationTicket;
use crate::types::{EntityId, FacingDirection, Position, TurnDirection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// User code passed to control-flow verbs.
pub type CodeBlock = Rc<dyn Fn(&mut GameController, Option<&EntityId>)>;

/// Lifecycle of a command, and of a queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandState {
    #[default]
    NotStarted,
    Working,
    Success,
    Failure,
}

impl CommandState {
    pub fn is_finished(self) -> bool {
        matches!(self, CommandState::Success | CommandState::Failure)
    }

    pub fn is_succeeded(self) -> bool {
        self == CommandState::Success
    }

    pub fn is_failed(self) -> bool {
        self == CommandState::Failure
    }
}

/// Why an entity died after moving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hazard {
    Drown,
    Burn,
}

/// The verb a command performs.
#[derive(Clone)]
pub enum CommandAction {
    MoveForward,
    MoveBackward,
    MoveDirection(FacingDirection),
    /// Greedy step increasing distance from another entity.
    MoveAway(EntityId),
    /// Greedy step decreasing distance to another entity.
    MoveToward(EntityId),
    MoveRandom,
    Turn(TurnDirection),
    TurnRandom,
    /// Place on the entity's own cell.
    PlaceBlock(String),
    PlaceDirection(String, FacingDirection),
    PlaceInFront(String),
    TillSoil,
    DestroyBlock,
    Use,
    Attack,
    Drop(String),
    Wait(u32),
    /// Spawn at a random free cell.
    SpawnEntity(String, FacingDirection),
    SpawnEntityAt(String, Position, FacingDirection),
    DestroyEntity,
    PlaySound(String),
    AddScore(i64),
    StartDay,
    StartNight,
    SetDayNightCycle {
        first_delay_ticks: u64,
        period_ticks: u64,
        start_day: bool,
    },
    IfBlockAhead { block_type: String, code: CodeBlock },
    /// `iterations == -1` repeats forever.
    Repeat { code: CodeBlock, iterations: i32 },
    RepeatRandom(CodeBlock),
    Flash,
    Explode,
}

impl CommandAction {
    /// Short verb name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            CommandAction::MoveForward => "moveForward",
            CommandAction::MoveBackward => "moveBackward",
            CommandAction::MoveDirection(_) => "moveDirection",
            CommandAction::MoveAway(_) => "moveAway",
            CommandAction::MoveToward(_) => "moveToward",
            CommandAction::MoveRandom => "moveRandom",
            CommandAction::Turn(_) => "turn",
            CommandAction::TurnRandom => "turnRandom",
            CommandAction::PlaceBlock(_) => "placeBlock",
            CommandAction::PlaceDirection(..) => "placeDirection",
            CommandAction::PlaceInFront(_) => "placeInFront",
            CommandAction::TillSoil => "tillSoil",
            CommandAction::DestroyBlock => "destroyBlock",
            CommandAction::Use => "use",
            CommandAction::Attack => "attack",
            CommandAction::Drop(_) => "drop",
            CommandAction::Wait(_) => "wait",
            CommandAction::SpawnEntity(..) => "spawnEntity",
            CommandAction::SpawnEntityAt(..) => "spawnEntityAt",
            CommandAction::DestroyEntity => "destroyEntity",
            CommandAction::PlaySound(_) => "playSound",
            CommandAction::AddScore(_) => "addScore",
            CommandAction::StartDay => "startDay",
            CommandAction::StartNight => "startNight",
            CommandAction::SetDayNightCycle { .. } => "setDayNightCycle",
            CommandAction::IfBlockAhead { .. } => "ifBlockAhead",
            CommandAction::Repeat { .. } => "repeat",
            CommandAction::RepeatRandom(_) => "repeatRandom",
            CommandAction::Flash => "flash",
            CommandAction::Explode => "explode",
        }
    }
}

impl fmt::Debug for CommandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandAction::MoveDirection(d) => write!(f, "moveDirection({d})"),
            CommandAction::MoveAway(id) | CommandAction::MoveToward(id) => {
                write!(f, "{}({id})", self.name())
            }
            CommandAction::Turn(t) => write!(f, "turn({t:?})"),
            CommandAction::PlaceBlock(b) | CommandAction::PlaceInFront(b) | CommandAction::Drop(b) => {
                write!(f, "{}({b:?})", self.name())
            }
            CommandAction::PlaceDirection(b, d) => write!(f, "placeDirection({b:?}, {d})"),
            CommandAction::Wait(t) => write!(f, "wait({t})"),
            CommandAction::SpawnEntity(t, d) => write!(f, "spawnEntity({t:?}, {d})"),
            CommandAction::SpawnEntityAt(t, p, d) => write!(f, "spawnEntityAt({t:?}, {p}, {d})"),
            CommandAction::PlaySound(s) => write!(f, "playSound({s:?})"),
            CommandAction::AddScore(n) => write!(f, "addScore({n})"),
            CommandAction::IfBlockAhead { block_type, .. } => write!(f, "ifBlockAhead({block_type:?})"),
            CommandAction::Repeat { iterations, .. } => write!(f, "repeat({iterations})"),
            other => f.write_str(other.name()),
        }
    }
}

/// What to do when a command's animation ticket completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AfterAnimation {
    Succeed,
    Fail,
    /// The entity died on arrival; the command fails.
    Die(Hazard),
}

/// What a working command is suspended on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Pending {
    #[default]
    Nothing,
    Animation(AnimationTicket, AfterAnimation),
    Ticks(u32),
}

/// One queued action.
pub struct Command {
    /// The entity this runs as. `None` for global commands.
    pub target: Option<EntityId>,
    pub action: CommandAction,
    /// Re-submitted by a repeat loop rather than issued directly.
    pub repeat: bool,
    /// UI block to highlight when this command begins.
    pub highlight: Option<String>,
    state: CommandState,
    pub(crate) on_finish: Option<CodeBlock>,
    pub(crate) pending: Pending,
    pub(crate) nested: Option<Box<CommandQueue>>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("target", &self.target)
            .field("action", &self.action)
            .field("repeat", &self.repeat)
            .field("state", &self.state)
            .field("pending", &self.pending)
            .field("nested", &self.nested)
            .finish()
    }
}

impl Command {
    pub fn new(target: Option<EntityId>, action: CommandAction) -> Self {
        Self {
            target,
            action,
            repeat: false,
            highlight: None,
            state: CommandState::NotStarted,
            on_finish: None,
            pending: Pending::Nothing,
            nested: None,
        }
    }

    pub fn with_highlight(mut self, block_id: impl Into<String>) -> Self {
        self.highlight = Some(block_id.into());
        self
    }

    /// Runs after the command succeeds.
    pub fn with_on_finish(mut self, code: CodeBlock) -> Self {
        self.on_finish = Some(code);
        self
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    pub fn is_succeeded(&self) -> bool {
        self.state.is_succeeded()
    }

    pub fn is_failed(&self) -> bool {
        self.state.is_failed()
    }

    pub fn is_started(&self) -> bool {
        self.state != CommandState::NotStarted
    }

    pub fn nested_queue(&self) -> Option<&CommandQueue> {
        self.nested.as_deref()
    }

    pub(crate) fn begin(&mut self) {
        if self.state == CommandState::NotStarted {
            self.state = CommandState::Working;
        }
    }

    pub fn succeeded(&mut self) {
        if self.state == CommandState::Working {
            self.state = CommandState::Success;
            self.pending = Pending::Nothing;
        }
    }

    pub fn failed(&mut self) {
        if self.state == CommandState::Working {
            self.state = CommandState::Failure;
            self.pending = Pending::Nothing;
        }
    }

    pub(crate) fn awaits_ticket(&self, ticket: AnimationTicket) -> bool {
        matches!(self.pending, Pending::Animation(t, _) if t == ticket)
    }
}
