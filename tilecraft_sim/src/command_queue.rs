// Per-entity command queue.
//
// Each entity (and the controller's global queue) owns one `CommandQueue`.
// It runs at most one command at a time (`current_command`); everything
// else waits in `command_list` in FIFO order. Two side channels change the
// order:
//
// - High-priority staging. Between `start_push_high_priority_commands` and
//   `end_push_high_priority_commands`, added commands collect in
//   `high_priority_commands` and are then moved to the *front* of the list,
//   keeping their relative order. Event reactions use this to jump ahead of
//   queued player commands.
// - Repeat loops. `repeat_commands` holds `(code, remaining)` pairs
//   (`-1` = forever). When the list drains, each entry's code is offered
//   once more and its count decremented; exhausted entries are dropped.
//   Commands the code adds during that round are flagged `repeat`.
//
// Insert mode (`while_command_insert_state`) redirects `add_command` into
// the nested queue of the current `IfBlockAhead` command, recursively, so
// code run inside a conditional lands inside it.
//
// The queue only holds state; `GameController::tick_queue` drives it with
// `pull_next` / `settle`, because beginning a command needs the whole
// world. Once a command fails, the queue is `Failure` and stops.
//
// See also: `command.rs` for the command state machine, `controller.rs` for
// the tick loop.

use crate::command::{CodeBlock, Command, CommandAction, CommandState};
use log::debug;
use std::collections::VecDeque;
use std::fmt;

/// Result of asking the queue for work this tick.
pub(crate) enum Pull {
    /// A current command exists (possibly just pulled from the list).
    Current,
    /// Nothing queued, but these repeat loops want another round.
    Repeats(Vec<CodeBlock>),
    /// Nothing left; the queue is now `Success`.
    Drained,
    /// The queue has failed and does no more work.
    Stopped,
}

/// How the current command ended.
pub(crate) enum Settled {
    Succeeded(Option<CodeBlock>),
    Failed,
}

#[derive(Default)]
pub struct CommandQueue {
    command_list: VecDeque<Command>,
    high_priority_commands: Vec<Command>,
    high_priority_mode: bool,
    repeat_commands: Vec<(CodeBlock, i32)>,
    current_command: Option<Command>,
    state: CommandState,
    while_command_insert_state: bool,
    reoffering: bool,
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("state", &self.state)
            .field("current_command", &self.current_command)
            .field("command_list", &self.command_list)
            .field("repeat_commands", &self.repeat_commands.len())
            .finish()
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    pub fn is_succeeded(&self) -> bool {
        self.state.is_succeeded()
    }

    pub fn is_failed(&self) -> bool {
        self.state.is_failed()
    }

    /// Nothing running, queued, or looping.
    pub fn is_idle(&self) -> bool {
        self.current_command.is_none()
            && self.command_list.is_empty()
            && self.high_priority_commands.is_empty()
            && self.repeat_commands.is_empty()
    }

    /// Ran out of work or failed.
    pub fn is_finished(&self) -> bool {
        self.is_failed() || self.is_idle()
    }

    /// Commands waiting behind the current one.
    pub fn get_length(&self) -> usize {
        self.command_list.len()
    }

    pub fn current_command(&self) -> Option<&Command> {
        self.current_command.as_ref()
    }

    pub(crate) fn current_command_mut(&mut self) -> Option<&mut Command> {
        self.current_command.as_mut()
    }

    pub fn queued(&self) -> impl Iterator<Item = &Command> {
        self.command_list.iter()
    }

    pub fn add_command(&mut self, mut command: Command) {
        if self.while_command_insert_state
            && let Some(nested) = self
                .current_command
                .as_mut()
                .filter(|c| matches!(c.action, CommandAction::IfBlockAhead { .. }))
                .and_then(|c| c.nested.as_deref_mut())
        {
            nested.add_command(command);
            return;
        }
        if self.reoffering {
            command.repeat = true;
        }
        if self.high_priority_mode {
            self.high_priority_commands.push(command);
        } else {
            self.command_list.push_back(command);
        }
        if self.state == CommandState::Success {
            self.state = CommandState::Working;
        }
    }

    pub fn start_push_high_priority_commands(&mut self) {
        self.high_priority_mode = true;
    }

    /// Moves the staged commands to the front, in the order they were added.
    pub fn end_push_high_priority_commands(&mut self) {
        self.high_priority_mode = false;
        for command in self.high_priority_commands.drain(..).rev() {
            self.command_list.push_front(command);
        }
    }

    pub fn add_repeat_command(&mut self, code: CodeBlock, iterations: i32) {
        if iterations == 0 {
            return;
        }
        self.repeat_commands.push((code, iterations));
        if self.state == CommandState::Success {
            self.state = CommandState::Working;
        }
    }

    pub fn repeat_count(&self) -> usize {
        self.repeat_commands.len()
    }

    pub fn set_while_command_insert_state(&mut self, inserting: bool) {
        self.while_command_insert_state = inserting;
    }

    /// Marks the span in which repeat bodies are re-run for this queue.
    pub(crate) fn set_reoffering(&mut self, reoffering: bool) {
        self.reoffering = reoffering;
    }

    /// The queue `depth` levels down through nested `IfBlockAhead`
    /// commands. Depth 0 is `self`.
    pub(crate) fn descend(&mut self, depth: usize) -> Option<&mut CommandQueue> {
        if depth == 0 {
            return Some(self);
        }
        self.current_command
            .as_mut()?
            .nested
            .as_deref_mut()?
            .descend(depth - 1)
    }

    #[allow(dead_code)]
    pub(crate) fn descend_ref(&self, depth: usize) -> Option<&CommandQueue> {
        if depth == 0 {
            return Some(self);
        }
        self.current_command
            .as_ref()?
            .nested
            .as_deref()?
            .descend_ref(depth - 1)
    }

    /// Makes sure a current command exists if there is any work.
    pub(crate) fn pull_next(&mut self) -> Pull {
        if self.state == CommandState::Failure {
            return Pull::Stopped;
        }
        if self.current_command.is_some() {
            return Pull::Current;
        }
        if let Some(next) = self.command_list.pop_front() {
            self.current_command = Some(next);
            self.state = CommandState::Working;
            return Pull::Current;
        }
        if !self.repeat_commands.is_empty() {
            let codes = self.repeat_commands.iter().map(|(code, _)| code.clone()).collect();
            for (_, remaining) in &mut self.repeat_commands {
                if *remaining > 0 {
                    *remaining -= 1;
                }
            }
            self.repeat_commands.retain(|(_, remaining)| *remaining != 0);
            return Pull::Repeats(codes);
        }
        self.state = CommandState::Success;
        Pull::Drained
    }

    /// Like `pull_next`, but only takes from the list: repeat loops are
    /// neither re-offered nor counted down. Returns whether a current
    /// command exists.
    pub(crate) fn pull_queued(&mut self) -> bool {
        if self.state == CommandState::Failure {
            return false;
        }
        if self.current_command.is_some() {
            return true;
        }
        let Some(next) = self.command_list.pop_front() else {
            return false;
        };
        self.current_command = Some(next);
        self.state = CommandState::Working;
        true
    }

    /// Pops the current command if it has finished. A failure poisons the
    /// queue.
    pub(crate) fn settle(&mut self) -> Option<Settled> {
        if !self.current_command.as_ref()?.is_finished() {
            return None;
        }
        let finished = self.current_command.take()?;
        if finished.is_succeeded() {
            debug!("command {:?} succeeded", finished.action);
            Some(Settled::Succeeded(finished.on_finish))
        } else {
            debug!("command {:?} failed", finished.action);
            self.state = CommandState::Failure;
            Some(Settled::Failed)
        }
    }

    /// Drops everything, including in-flight and looping commands.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
