// Game controller: the tick loop and everything that spans entities.
//
// `GameController` owns the `LevelModel`, the global command queue (sounds,
// score, day/night, spawns), the PRNG, the event listeners, the
// presentation outbox, and the attempt lifecycle.
//
// ## Tick
//
// `tick()` advances, in order:
//
// 1. the day/night cycle, if one is set,
// 2. the global queue,
// 3. every entity's queue, in spawn order (a snapshot of identifiers taken
//    after the global queue, so entities spawned by other entities start
//    next tick),
// 4. plane notices, turned into presentation requests,
// 5. attempt resolution.
//
// Each queue advances at most one command per tick: pull the next command
// (re-offering repeat loops when the list is empty), begin it or tick it,
// then settle it if it finished. A re-offered round counts its loops down
// once; work the bodies queued on this queue is pulled right away,
// otherwise the queue idles until the next tick's round. Beginning runs the
// verb (`actions.rs`), which yields a `Step`: finished now, await an
// animation ticket, wait some ticks, or run a nested `IfBlockAhead` queue.
// Nested queues are addressed by `QueuePath` (owner plus depth) and ticked
// recursively from their parent command.
//
// ## Tickets
//
// Every animation request carries a fresh `AnimationTicket` and the path of
// the queue whose current command is waiting on it. `complete_animation`
// looks the path up and resumes the command. A ticket whose command is gone
// is dropped.
//
// Beginning a command for an entity whose behaviour tracks a selection
// indicator (the player) and that moved or turned it also emits a
// `SelectionIndicator` request for the cell in front.
//
// ## Attempts
//
// `start_attempt` marks the attempt running and dispatches `WhenRun`. The
// attempt fails as soon as the player (or agent) queue fails, the player
// dies, or the failure check holds. With a verification timeout the
// attempt resolves by verification when the timeout elapses. Otherwise it
// resolves once the player, agent, and global queues are all finished and
// no animation is in flight: freeplay levels always succeed, other levels
// succeed if verification holds.
//
// See also: `actions.rs` (verb execution), `verbs.rs` (public verb API),
// `command_queue.rs`, `presentation.rs`.

use crate::command::{AfterAnimation, CodeBlock, Command, Pending};
use crate::command_queue::{CommandQueue, Pull, Settled};
use crate::config::{GameConfig, LevelConfig};
use crate::error::LevelError;
use crate::event::{EventListener, EventType, GameEvent};
use crate::level::LevelModel;
use crate::plane::PlaneNotice;
use crate::presentation::{AnimationRequest, AnimationTicket, EndAnimation, PresentationRequest};
use crate::types::{EntityId, FacingDirection, Position};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::rc::Rc;
use tilecraft_prng::GameRng;

/// Which queue a command lives in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueueOwner {
    Global,
    Entity(EntityId),
}

/// A queue, possibly nested inside `IfBlockAhead` commands. Depth 0 is the
/// owner's own queue; depth `n` is the nested queue of the current command
/// of the queue at depth `n - 1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuePath {
    pub owner: QueueOwner,
    pub depth: usize,
}

impl QueuePath {
    pub fn root(owner: QueueOwner) -> Self {
        Self { owner, depth: 0 }
    }

    pub fn nested(&self) -> Self {
        Self {
            owner: self.owner.clone(),
            depth: self.depth + 1,
        }
    }

    pub fn entity(&self) -> Option<&EntityId> {
        match &self.owner {
            QueueOwner::Global => None,
            QueueOwner::Entity(id) => Some(id),
        }
    }
}

/// What beginning a command produced.
pub(crate) enum Step {
    Done(bool),
    Await(AnimationRequest, AfterAnimation),
    Wait(u32),
    /// The command's nested queue has work; tick it until drained.
    Nested,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AttemptState {
    Idle,
    Running { started_at: u64 },
    Finished(bool),
}

#[derive(Clone, Copy, Debug)]
struct DayNightCycle {
    next_toggle: u64,
    period: u64,
    next_is_day: bool,
}

/// Custom win/loss predicate.
pub type LevelPredicate = Box<dyn Fn(&LevelModel) -> bool>;

pub struct GameController {
    pub(crate) level: LevelModel,
    pub(crate) global_queue: CommandQueue,
    pub(crate) rng: GameRng,
    tick: u64,
    next_ticket: u64,
    tickets: BTreeMap<AnimationTicket, QueuePath>,
    outbox: Vec<PresentationRequest>,
    listeners: Vec<EventListener>,
    attempt: AttemptState,
    on_complete: Option<Box<dyn FnOnce(bool)>>,
    verification: Option<LevelPredicate>,
    failure_check: Option<LevelPredicate>,
    day_night: Option<DayNightCycle>,
    /// Set by `with_highlight`; stamped onto commands added meanwhile.
    pub(crate) highlight_block: Option<String>,
}

impl GameController {
    pub fn new(config: LevelConfig, game_config: GameConfig) -> Result<Self, LevelError> {
        Ok(Self::from_level(LevelModel::new(config, game_config)?))
    }

    pub fn from_level(level: LevelModel) -> Self {
        let rng = GameRng::new(level.config().seed);
        Self {
            level,
            global_queue: CommandQueue::new(),
            rng,
            tick: 0,
            next_ticket: 0,
            tickets: BTreeMap::new(),
            outbox: Vec::new(),
            listeners: Vec::new(),
            attempt: AttemptState::Idle,
            on_complete: None,
            verification: None,
            failure_check: None,
            day_night: None,
            highlight_block: None,
        }
    }

    pub fn level(&self) -> &LevelModel {
        &self.level
    }

    pub fn level_mut(&mut self) -> &mut LevelModel {
        &mut self.level
    }

    pub fn game_config(&self) -> &GameConfig {
        self.level.game_config()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn global_queue(&self) -> &CommandQueue {
        &self.global_queue
    }

    pub fn entity_queue(&self, id: &EntityId) -> Option<&CommandQueue> {
        self.level.entity(id).map(|e| &e.queue)
    }

    /// Animations handed out and not yet completed.
    pub fn in_flight_animations(&self) -> usize {
        self.tickets.len()
    }

    // -----------------------------------------------------------------------
    // Queues
    // -----------------------------------------------------------------------

    pub(crate) fn queue_mut(&mut self, path: &QueuePath) -> Option<&mut CommandQueue> {
        let root = match &path.owner {
            QueueOwner::Global => &mut self.global_queue,
            QueueOwner::Entity(id) => &mut self.level.entity_mut(id)?.queue,
        };
        root.descend(path.depth)
    }

    pub(crate) fn entity_queue_mut(&mut self, id: &EntityId) -> Option<&mut CommandQueue> {
        self.level.entity_mut(id).map(|e| &mut e.queue)
    }

    /// Routes a command to its target's queue, or the global queue when it
    /// has no target.
    pub fn add_command(&mut self, mut command: Command) -> bool {
        if command.highlight.is_none() {
            command.highlight = self.highlight_block.clone();
        }
        let Some(id) = command.target.clone() else {
            self.global_queue.add_command(command);
            return true;
        };
        match self.level.entity_mut(&id) {
            Some(entity) => {
                entity.queue.add_command(command);
                true
            }
            None => {
                warn!("command {:?} for unknown entity {id}", command.action);
                false
            }
        }
    }

    /// Runs `code` so that commands it issues for the path's owner land in
    /// the queue at `path`.
    pub(crate) fn run_code_into(&mut self, path: &QueuePath, code: &CodeBlock) {
        self.set_insert_state(path, true);
        let entity = path.entity().cloned();
        code(self, entity.as_ref());
        self.set_insert_state(path, false);
    }

    fn set_insert_state(&mut self, path: &QueuePath, inserting: bool) {
        for depth in 0..path.depth {
            let level_path = QueuePath {
                owner: path.owner.clone(),
                depth,
            };
            if let Some(queue) = self.queue_mut(&level_path) {
                queue.set_while_command_insert_state(inserting);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Tick loop
    // -----------------------------------------------------------------------

    pub fn tick(&mut self) {
        if matches!(self.attempt, AttemptState::Finished(_)) {
            return;
        }
        self.tick += 1;
        self.advance_day_night();
        self.tick_queue(&QueuePath::root(QueueOwner::Global));
        for id in self.level.entity_ids() {
            self.tick_queue(&QueuePath::root(QueueOwner::Entity(id)));
        }
        self.flush_notices();
        self.resolve_attempt();
    }

    pub(crate) fn tick_queue(&mut self, path: &QueuePath) {
        let pull = match self.queue_mut(path) {
            Some(queue) => queue.pull_next(),
            None => return,
        };
        let ready = match pull {
            Pull::Current => true,
            Pull::Repeats(codes) => self.reoffer(path, &codes),
            Pull::Drained | Pull::Stopped => false,
        };
        if !ready {
            return;
        }

        let Some(command) = self.queue_mut(path).and_then(|q| q.current_command_mut()) else {
            return;
        };
        if !command.is_started() {
            command.begin();
            let action = command.action.clone();
            let repeat = command.repeat;
            if let Some(highlight) = command.highlight.clone() {
                self.outbox.push(PresentationRequest::Highlight(highlight));
            }
            if repeat {
                debug!("{:?} begins {action:?} (repeat round)", path.owner);
            } else {
                debug!("{:?} begins {action:?}", path.owner);
            }
            let before = self.indicator_pose(path);
            let step = self.execute(path, &action);
            self.apply_step(path, step);
            self.update_selection_indicator(path, before);
        } else if !command.is_finished() {
            self.tick_command(path);
        }

        let settled = self.queue_mut(path).and_then(CommandQueue::settle);
        if let Some(Settled::Succeeded(Some(code))) = settled {
            let entity = path.entity().cloned();
            code(self, entity.as_ref());
        }
    }

    /// Runs one round of repeat bodies for the queue at `path`. The loops
    /// have already been counted down; only the work the bodies queued on
    /// this queue is pulled, so a body that queues nothing here still
    /// counts as one iteration. Returns whether a current command exists.
    fn reoffer(&mut self, path: &QueuePath, codes: &[CodeBlock]) -> bool {
        if let Some(queue) = self.queue_mut(path) {
            queue.set_reoffering(true);
        }
        for code in codes {
            self.run_code_into(path, code);
        }
        self.queue_mut(path).is_some_and(|queue| {
            queue.set_reoffering(false);
            queue.pull_queued()
        })
    }

    /// Position and facing of an entity that tracks a selection indicator.
    fn indicator_pose(&self, path: &QueuePath) -> Option<(Position, FacingDirection)> {
        let entity = self.level.entity(path.entity()?)?;
        entity
            .behavior()
            .should_update_selection_indicator()
            .then_some((entity.position, entity.facing))
    }

    fn update_selection_indicator(&mut self, path: &QueuePath, before: Option<(Position, FacingDirection)>) {
        let Some(before) = before else {
            return;
        };
        let Some(after) = self.indicator_pose(path) else {
            return;
        };
        if after == before {
            return;
        }
        if let Some(entity) = path.entity().cloned() {
            let (position, facing) = after;
            self.outbox.push(PresentationRequest::SelectionIndicator {
                entity,
                position: position.forward(facing),
            });
        }
    }

    fn apply_step(&mut self, path: &QueuePath, step: Step) {
        let ticket = match &step {
            Step::Await(..) => Some(self.issue_ticket(path)),
            _ => None,
        };
        let Some(command) = self.queue_mut(path).and_then(|q| q.current_command_mut()) else {
            if let Some(ticket) = ticket {
                self.tickets.remove(&ticket);
            }
            return;
        };
        match step {
            Step::Done(true) | Step::Wait(0) => command.succeeded(),
            Step::Done(false) => command.failed(),
            Step::Wait(ticks) => command.pending = Pending::Ticks(ticks),
            Step::Nested => {}
            Step::Await(request, after) => {
                if let Some(ticket) = ticket {
                    command.pending = Pending::Animation(ticket, after);
                    self.outbox.push(PresentationRequest::Animation { ticket, request });
                }
            }
        }
    }

    fn tick_command(&mut self, path: &QueuePath) {
        let Some(command) = self.queue_mut(path).and_then(|q| q.current_command_mut()) else {
            return;
        };
        match command.pending {
            Pending::Ticks(remaining) => {
                if remaining <= 1 {
                    command.succeeded();
                } else {
                    command.pending = Pending::Ticks(remaining - 1);
                }
            }
            Pending::Animation(..) => {}
            Pending::Nothing => {
                if command.nested.is_none() {
                    return;
                }
                let nested = path.nested();
                self.tick_queue(&nested);
                let Some(command) = self.queue_mut(path).and_then(|q| q.current_command_mut()) else {
                    return;
                };
                match command.nested.as_deref() {
                    Some(inner) if inner.is_failed() => command.failed(),
                    Some(inner) if inner.is_idle() => command.succeeded(),
                    _ => {}
                }
            }
        }
    }

    fn issue_ticket(&mut self, path: &QueuePath) -> AnimationTicket {
        let ticket = AnimationTicket(self.next_ticket);
        self.next_ticket += 1;
        self.tickets.insert(ticket, path.clone());
        ticket
    }

    /// Reports that the presentation layer finished an animation.
    pub fn complete_animation(&mut self, ticket: AnimationTicket) {
        let Some(path) = self.tickets.remove(&ticket) else {
            debug!("ignoring unknown ticket {ticket:?}");
            return;
        };
        let Some(command) = self.queue_mut(&path).and_then(|q| q.current_command_mut()) else {
            debug!("ticket {ticket:?} outlived its command");
            return;
        };
        if !command.awaits_ticket(ticket) {
            return;
        }
        let Pending::Animation(_, after) = command.pending else {
            return;
        };
        match after {
            AfterAnimation::Succeed => command.succeeded(),
            AfterAnimation::Fail => command.failed(),
            AfterAnimation::Die(hazard) => {
                command.failed();
                if let Some(id) = path.entity().cloned() {
                    info!("{id} died: {hazard:?}");
                    self.level.kill_entity(&id);
                    self.outbox.push(PresentationRequest::HazardDeath { entity: id, hazard });
                }
            }
        }
    }

    /// Takes every presentation request issued since the last call.
    pub fn drain_presentation(&mut self) -> Vec<PresentationRequest> {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn present(&mut self, request: PresentationRequest) {
        self.outbox.push(request);
    }

    fn flush_notices(&mut self) {
        let mut refreshed = Vec::new();
        for (plane, notice) in self.level.take_notices() {
            let request = match notice {
                PlaneNotice::RefreshCell(position) => {
                    if refreshed.contains(&(plane, position)) {
                        continue;
                    }
                    refreshed.push((plane, position));
                    PresentationRequest::RefreshBlock { plane, position }
                }
                PlaneNotice::DoorAnimation { position, open } => {
                    PresentationRequest::DoorAnimation { position, open }
                }
                PlaneNotice::ConduitAnimation { position, active } => {
                    PresentationRequest::ConduitAnimation { position, active }
                }
                PlaneNotice::Explosion(position) => PresentationRequest::Explosion(position),
            };
            self.outbox.push(request);
        }
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub fn add_event_listener(&mut self, listener: EventListener) {
        self.listeners.push(listener);
    }

    /// Registers `handler` for `event_type`, optionally only for entities of
    /// `target_type`.
    pub fn when(
        &mut self,
        event_type: EventType,
        target_type: Option<&str>,
        handler: impl Fn(&mut GameController, &GameEvent) + 'static,
    ) {
        let target_type = target_type.map(str::to_string);
        self.add_event_listener(Rc::new(move |controller, event| {
            if event.matches(event_type, target_type.as_deref()) {
                handler(controller, event);
            }
        }));
    }

    pub fn dispatch_event(&mut self, event: &GameEvent) {
        debug!("event {:?} on {:?}", event.event_type, event.target_identifier);
        let listeners = self.listeners.clone();
        for listener in listeners {
            listener(self, event);
        }
    }

    pub(crate) fn dispatch_entity_event(
        &mut self,
        event_type: EventType,
        target: &EntityId,
        triggered_by: Option<&EntityId>,
    ) {
        let Some(target_type) = self.level.entity(target).map(|e| e.entity_type.clone()) else {
            return;
        };
        let mut event = GameEvent::for_entity(event_type, target, &target_type);
        if let Some(by) = triggered_by {
            event = event.triggered_by(by);
        }
        self.dispatch_event(&event);
    }

    // -----------------------------------------------------------------------
    // Day / night
    // -----------------------------------------------------------------------

    /// Switches lighting and tells every entity. No-op if unchanged.
    pub fn set_daytime(&mut self, is_daytime: bool) {
        if self.level.is_daytime() == is_daytime {
            return;
        }
        self.level.set_daytime(is_daytime);
        self.outbox.push(PresentationRequest::DayNight { is_daytime });
        let (each, global) = if is_daytime {
            (EventType::WhenDay, EventType::WhenDayGlobal)
        } else {
            (EventType::WhenNight, EventType::WhenNightGlobal)
        };
        for id in self.level.entity_ids() {
            self.dispatch_entity_event(each, &id, None);
        }
        self.dispatch_event(&GameEvent::global(global));
    }

    /// After `first_delay` ticks switch to day (or night), then toggle every
    /// `period` ticks. A zero period switches once.
    pub fn set_day_night_cycle(&mut self, first_delay: u64, period: u64, start_day: bool) {
        self.day_night = Some(DayNightCycle {
            next_toggle: self.tick + first_delay,
            period,
            next_is_day: start_day,
        });
    }

    fn advance_day_night(&mut self) {
        let Some(mut cycle) = self.day_night else {
            return;
        };
        if self.tick < cycle.next_toggle {
            return;
        }
        self.set_daytime(cycle.next_is_day);
        if cycle.period == 0 {
            self.day_night = None;
            return;
        }
        cycle.next_is_day = !cycle.next_is_day;
        cycle.next_toggle += cycle.period;
        self.day_night = Some(cycle);
    }

    // -----------------------------------------------------------------------
    // Attempt lifecycle
    // -----------------------------------------------------------------------

    /// Replaces the level's declarative verification.
    pub fn set_verification(&mut self, predicate: impl Fn(&LevelModel) -> bool + 'static) {
        self.verification = Some(Box::new(predicate));
    }

    pub fn set_failure_check(&mut self, predicate: impl Fn(&LevelModel) -> bool + 'static) {
        self.failure_check = Some(Box::new(predicate));
    }

    /// Starts the attempt; `on_complete` receives the result once it
    /// resolves.
    pub fn start_attempt(&mut self, on_complete: impl FnOnce(bool) + 'static) {
        if self.attempt != AttemptState::Idle {
            warn!("start_attempt while an attempt is {:?}", self.attempt);
            return;
        }
        info!("attempt started at tick {}", self.tick);
        self.attempt = AttemptState::Running { started_at: self.tick };
        self.on_complete = Some(Box::new(on_complete));
        self.dispatch_event(&GameEvent::global(EventType::WhenRun));
    }

    pub fn attempt_result(&self) -> Option<bool> {
        match self.attempt {
            AttemptState::Finished(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_attempt_running(&self) -> bool {
        matches!(self.attempt, AttemptState::Running { .. })
    }

    /// Rebuilds the level and drops all queued work, listeners, and
    /// in-flight animations.
    pub fn reset_attempt(&mut self) {
        info!("attempt reset");
        self.level.reset();
        self.global_queue.reset();
        self.rng = GameRng::new(self.level.config().seed);
        self.tick = 0;
        self.tickets.clear();
        self.outbox.clear();
        self.listeners.clear();
        self.attempt = AttemptState::Idle;
        self.on_complete = None;
        self.day_night = None;
        self.highlight_block = None;
    }

    fn verify(&self) -> bool {
        match &self.verification {
            Some(predicate) => predicate(&self.level),
            None => self
                .level
                .config()
                .verification
                .as_ref()
                .is_none_or(|c| c.evaluate(&self.level)),
        }
    }

    fn failure_detected(&self) -> bool {
        match &self.failure_check {
            Some(predicate) => predicate(&self.level),
            None => self
                .level
                .config()
                .failure_check
                .as_ref()
                .is_some_and(|c| c.evaluate(&self.level)),
        }
    }

    fn controlled_queues_finished(&self) -> bool {
        let finished = |id: EntityId| self.level.entity(&id).is_none_or(|e| e.queue.is_finished());
        self.global_queue.is_finished()
            && finished(EntityId::player())
            && finished(EntityId::agent())
            && self.tickets.is_empty()
    }

    fn resolve_attempt(&mut self) {
        let AttemptState::Running { started_at } = self.attempt else {
            return;
        };
        let controlled_failed = [EntityId::player(), EntityId::agent()].iter().any(|id| {
            self.level
                .entity(id)
                .is_some_and(|e| e.queue.is_failed() || !e.is_alive())
        });
        if controlled_failed || self.failure_detected() {
            self.finish_attempt(false);
            return;
        }
        let timeout = self.level.config().level_verification_timeout;
        if let Some(timeout) = timeout
            && self.tick - started_at >= timeout
        {
            let result = self.verify();
            self.finish_attempt(result);
            return;
        }
        if !self.controlled_queues_finished() {
            return;
        }
        if self.level.config().is_freeplay() || self.verify() {
            self.finish_attempt(true);
        } else if timeout.is_none() {
            self.finish_attempt(false);
        }
    }

    fn finish_attempt(&mut self, success: bool) {
        info!("attempt finished at tick {}: {}", self.tick, if success { "success" } else { "failure" });
        self.attempt = AttemptState::Finished(success);
        let animation = EndAnimation::select(self.level.config().special_level_type, success);
        self.outbox.push(PresentationRequest::LevelEnd { success, animation });
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(success);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandAction;
    use std::cell::{Cell, RefCell};

    fn controller(ground: &str, action: &[&str]) -> GameController {
        controller_with(ground, action, |_| {})
    }

    fn controller_with(ground: &str, action: &[&str], tweak: impl FnOnce(&mut LevelConfig)) -> GameController {
        let width = action[0].len() as i32;
        let height = action.len() as i32;
        let mut config = LevelConfig {
            grid_dimensions: [width, height],
            ground_plane: vec![ground.to_string(); (width * height) as usize],
            action_plane: action
                .iter()
                .flat_map(|row| row.chars())
                .map(|c| if c == '#' { "stone".to_string() } else { String::new() })
                .collect(),
            ground_decoration_plane: Vec::new(),
            fluff_plane: Vec::new(),
            entities: Vec::new(),
            use_player: true,
            player_start_position: [0, 0],
            player_start_direction: FacingDirection::East,
            use_agent: false,
            agent_start_position: None,
            agent_start_direction: FacingDirection::South,
            is_daytime: true,
            is_direct_player_control: false,
            verification: None,
            failure_check: None,
            level_verification_timeout: None,
            special_level_type: None,
            seed: 11,
        };
        tweak(&mut config);
        GameController::new(config, GameConfig::default()).unwrap()
    }

    fn player_cmd(action: CommandAction) -> Command {
        Command::new(Some(EntityId::player()), action)
    }

    /// Ticks and completes every animation immediately.
    fn run(ctl: &mut GameController, ticks: usize) {
        for _ in 0..ticks {
            ctl.tick();
            for request in ctl.drain_presentation() {
                if let PresentationRequest::Animation { ticket, .. } = request {
                    ctl.complete_animation(ticket);
                }
            }
        }
    }

    #[test]
    fn commands_route_to_their_target() {
        let mut ctl = controller("grass", &["..."]);
        assert!(ctl.add_command(player_cmd(CommandAction::MoveForward)));
        assert!(ctl.add_command(Command::new(None, CommandAction::AddScore(1))));
        assert!(!ctl.add_command(Command::new(Some(EntityId::new("nobody")), CommandAction::Use)));
        assert_eq!(ctl.entity_queue(&EntityId::player()).unwrap().get_length(), 1);
        assert_eq!(ctl.global_queue().get_length(), 1);
    }

    #[test]
    fn animation_holds_the_queue_until_completed() {
        let mut ctl = controller("grass", &["...."]);
        ctl.add_command(player_cmd(CommandAction::MoveForward));
        ctl.add_command(player_cmd(CommandAction::MoveForward));
        ctl.tick();
        let requests = ctl.drain_presentation();
        let tickets: Vec<AnimationTicket> = requests
            .iter()
            .filter_map(|r| match r {
                PresentationRequest::Animation { ticket, .. } => Some(*ticket),
                _ => None,
            })
            .collect();
        assert_eq!(tickets.len(), 1);
        // Moved immediately; the second command waits for the ticket.
        assert_eq!(ctl.level().player().unwrap().position.x, 1);
        ctl.tick();
        ctl.tick();
        assert_eq!(ctl.level().player().unwrap().position.x, 1);
        let queue = ctl.entity_queue(&EntityId::player()).unwrap();
        assert!(queue.current_command().unwrap().state() == crate::command::CommandState::Working);
        assert_eq!(queue.get_length(), 1);

        ctl.complete_animation(tickets[0]);
        // Completing twice is harmless.
        ctl.complete_animation(tickets[0]);
        run(&mut ctl, 3);
        assert_eq!(ctl.level().player().unwrap().position.x, 2);
        assert_eq!(ctl.in_flight_animations(), 0);
    }

    #[test]
    fn wait_counts_down_ticks() {
        let mut ctl = controller("grass", &["..."]);
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();
        ctl.add_command(player_cmd(CommandAction::Wait(3)).with_on_finish(Rc::new(move |_, _| flag.set(true))));
        ctl.tick(); // begin
        ctl.tick();
        assert!(!done.get());
        ctl.tick();
        ctl.tick();
        assert!(done.get());
    }

    #[test]
    fn repeat_reoffers_code_each_round() {
        let mut ctl = controller("grass", &["..."]);
        let rounds = Rc::new(Cell::new(0));
        let counter = rounds.clone();
        let code: CodeBlock = Rc::new(move |ctl, me| {
            counter.set(counter.get() + 1);
            ctl.add_command(Command::new(me.cloned(), CommandAction::Wait(0)));
        });
        ctl.add_command(player_cmd(CommandAction::Repeat { code, iterations: 3 }));
        run(&mut ctl, 20);
        assert_eq!(rounds.get(), 3);
        let queue = ctl.entity_queue(&EntityId::player()).unwrap();
        assert!(queue.is_idle());
        assert!(queue.is_succeeded());
    }

    #[test]
    fn repeat_body_issuing_elsewhere_runs_every_round() {
        let mut ctl = controller("grass", &["..."]);
        let rounds = Rc::new(Cell::new(0));
        let counter = rounds.clone();
        let code: CodeBlock = Rc::new(move |ctl, _| {
            counter.set(counter.get() + 1);
            ctl.add_command(Command::new(None, CommandAction::AddScore(1)));
        });
        ctl.add_command(player_cmd(CommandAction::Repeat { code, iterations: 3 }));
        run(&mut ctl, 20);
        assert_eq!(rounds.get(), 3);
        assert_eq!(ctl.level().score(), 3);
        let queue = ctl.entity_queue(&EntityId::player()).unwrap();
        assert!(queue.is_idle());
        assert!(queue.is_succeeded());
    }

    #[test]
    fn empty_repeat_body_runs_once_per_tick() {
        let mut ctl = controller("grass", &["..."]);
        let rounds = Rc::new(Cell::new(0));
        let counter = rounds.clone();
        let code: CodeBlock = Rc::new(move |_, _| counter.set(counter.get() + 1));
        ctl.add_command(player_cmd(CommandAction::Repeat { code, iterations: 4 }));
        // Tick 1 registers the loop; every later tick runs one round.
        run(&mut ctl, 3);
        assert_eq!(rounds.get(), 2);
        run(&mut ctl, 10);
        assert_eq!(rounds.get(), 4);
        assert!(ctl.entity_queue(&EntityId::player()).unwrap().is_idle());
    }

    #[test]
    fn reoffered_commands_carry_the_repeat_flag() {
        let mut ctl = controller("grass", &["..."]);
        let code: CodeBlock = Rc::new(|ctl, me| {
            ctl.add_command(Command::new(me.cloned(), CommandAction::Wait(5)));
        });
        ctl.add_command(player_cmd(CommandAction::Repeat { code, iterations: 2 }));
        ctl.add_command(player_cmd(CommandAction::Wait(1)));
        ctl.tick();
        ctl.tick();
        let current = ctl.entity_queue(&EntityId::player()).unwrap().current_command().unwrap();
        assert!(matches!(current.action, CommandAction::Wait(1)));
        assert!(!current.repeat);
        ctl.tick();
        ctl.tick();
        let current = ctl.entity_queue(&EntityId::player()).unwrap().current_command().unwrap();
        assert!(matches!(current.action, CommandAction::Wait(5)));
        assert!(current.repeat);
    }

    #[test]
    fn highlight_is_requested_when_a_command_begins() {
        let mut ctl = controller("grass", &["..."]);
        ctl.add_command(player_cmd(CommandAction::TurnRandom).with_highlight("block_7"));
        ctl.add_command(player_cmd(CommandAction::Wait(1)));
        ctl.tick();
        let requests = ctl.drain_presentation();
        assert_eq!(requests.first(), Some(&PresentationRequest::Highlight("block_7".into())));
        for request in &requests {
            if let PresentationRequest::Animation { ticket, .. } = request {
                ctl.complete_animation(*ticket);
            }
        }
        let mut highlights = 0;
        for _ in 0..4 {
            ctl.tick();
            highlights += ctl
                .drain_presentation()
                .into_iter()
                .filter(|r| matches!(r, PresentationRequest::Highlight(_)))
                .count();
        }
        assert_eq!(highlights, 0);
        assert!(ctl.entity_queue(&EntityId::player()).unwrap().is_idle());
    }

    #[test]
    fn player_moves_update_the_selection_indicator() {
        let mut ctl = controller("grass", &["...", "..."]);
        ctl.add_command(player_cmd(CommandAction::MoveForward));
        ctl.add_command(player_cmd(CommandAction::Wait(1)));
        ctl.tick();
        let indicators: Vec<PresentationRequest> = ctl
            .drain_presentation()
            .into_iter()
            .filter(|r| matches!(r, PresentationRequest::SelectionIndicator { .. }))
            .collect();
        assert_eq!(
            indicators,
            [PresentationRequest::SelectionIndicator {
                entity: EntityId::player(),
                position: Position::new(2, 0),
            }]
        );
    }

    #[test]
    fn if_block_ahead_runs_nested_commands_first() {
        let mut ctl = controller("grass", &[".#.."]);
        let code: CodeBlock = Rc::new(|ctl, me| {
            ctl.add_command(Command::new(me.cloned(), CommandAction::DestroyBlock));
        });
        ctl.add_command(player_cmd(CommandAction::IfBlockAhead {
            block_type: "stone".into(),
            code,
        }));
        ctl.add_command(player_cmd(CommandAction::MoveForward));
        ctl.tick();
        // The destroy landed in the nested queue, not behind moveForward.
        let queue = ctl.entity_queue(&EntityId::player()).unwrap();
        assert_eq!(queue.get_length(), 1);
        let nested = queue.current_command().unwrap().nested_queue().unwrap();
        assert_eq!(nested.get_length(), 1);

        run(&mut ctl, 10);
        assert_eq!(ctl.level().player().unwrap().position.x, 1);
        assert!(ctl.level().miniblocks().is_empty(), "walking over the drop collects it");
        assert_eq!(ctl.level().player().unwrap().inventory_count("stone"), 1);
    }

    #[test]
    fn failed_command_fails_the_attempt() {
        let mut ctl = controller("grass", &[".#"]);
        let result = Rc::new(RefCell::new(None));
        let sink = result.clone();
        ctl.add_command(player_cmd(CommandAction::MoveForward));
        ctl.start_attempt(move |ok| *sink.borrow_mut() = Some(ok));
        run(&mut ctl, 5);
        assert_eq!(*result.borrow(), Some(false));
        assert_eq!(ctl.attempt_result(), Some(false));
        let ends = ctl.drain_presentation();
        assert!(ends.is_empty(), "tick stops after the attempt ends");
    }

    #[test]
    fn idle_attempt_resolves_by_verification() {
        let mut ctl = controller("grass", &["..."]);
        ctl.set_verification(|level| level.score() >= 2);
        ctl.add_command(Command::new(None, CommandAction::AddScore(2)));
        ctl.start_attempt(|_| {});
        run(&mut ctl, 5);
        assert_eq!(ctl.attempt_result(), Some(true));

        ctl.reset_attempt();
        assert_eq!(ctl.attempt_result(), None);
        ctl.set_verification(|level| level.score() >= 2);
        ctl.start_attempt(|_| {});
        run(&mut ctl, 5);
        assert_eq!(ctl.attempt_result(), Some(false));
    }

    #[test]
    fn timeout_waits_for_the_deadline() {
        let mut ctl = controller_with("grass", &["..."], |c| c.level_verification_timeout = Some(10));
        ctl.set_verification(|level| level.score() > 0);
        ctl.start_attempt(|_| {});
        run(&mut ctl, 5);
        assert_eq!(ctl.attempt_result(), None);
        ctl.add_command(Command::new(None, CommandAction::AddScore(1)));
        run(&mut ctl, 10);
        assert_eq!(ctl.attempt_result(), Some(true));
    }

    #[test]
    fn day_night_cycle_toggles_and_notifies() {
        let mut ctl = controller("grass", &["..."]);
        let nights = Rc::new(Cell::new(0));
        let counter = nights.clone();
        ctl.when(EventType::WhenNightGlobal, None, move |_, _| counter.set(counter.get() + 1));
        ctl.set_day_night_cycle(2, 3, false);
        run(&mut ctl, 1);
        assert!(ctl.level().is_daytime());
        run(&mut ctl, 1);
        assert!(!ctl.level().is_daytime());
        run(&mut ctl, 3);
        assert!(ctl.level().is_daytime());
        run(&mut ctl, 3);
        assert!(!ctl.level().is_daytime());
        assert_eq!(nights.get(), 2);
    }

    #[test]
    fn run_event_fires_on_start() {
        let mut ctl = controller("grass", &["..."]);
        ctl.when(EventType::WhenRun, None, |ctl, _| {
            ctl.add_command(Command::new(Some(EntityId::player()), CommandAction::TurnRandom));
        });
        ctl.start_attempt(|_| {});
        assert_eq!(ctl.entity_queue(&EntityId::player()).unwrap().get_length(), 1);
    }

    #[test]
    fn stale_tickets_are_ignored_after_reset() {
        let mut ctl = controller("grass", &["..."]);
        ctl.add_command(player_cmd(CommandAction::MoveForward));
        ctl.tick();
        let ticket = ctl
            .drain_presentation()
            .into_iter()
            .find_map(|r| match r {
                PresentationRequest::Animation { ticket, .. } => Some(ticket),
                _ => None,
            })
            .unwrap();
        ctl.reset_attempt();
        ctl.complete_animation(ticket);
        assert_eq!(ctl.level().player().unwrap().position.x, 0);
        assert!(ctl.entity_queue(&EntityId::player()).unwrap().is_idle());
    }
}
