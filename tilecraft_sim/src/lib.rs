// tilecraft_sim: headless tile-grid simulation core.
//
// This crate holds the whole game logic of a block-building puzzle level:
// the layered block grid with its redstone/rail/piston propagation, the
// entities that walk it, the per-entity command queues that sequence user
// programs, and the controller that ticks everything and talks to a
// presentation layer through animation tickets. It has no rendering or
// timing dependencies and runs entirely headless.
//
// Module overview:
// - `types.rs`:         Position, FacingDirection, TurnDirection, EntityId.
// - `block.rs`:         LevelBlock = immutable BlockKind (rule table) + mutable BlockState.
// - `adjacency.rs`:     AdjacencySet: connected components of redstone cells.
// - `plane.rs`:         LevelPlane: one grid layer; the ordered edit pipeline for the action plane.
// - `fog.rs`:           Fog-of-war sector bucketing around light sources.
// - `shading.rs`:       Ground shadow and edge decoration directives.
// - `entity.rs`:        LevelEntity, EntityBehavior subtypes, the type-tag registry.
// - `level.rs`:         LevelModel: planes + entities + day/night; movement and placement legality.
// - `command.rs`:       Command / CommandAction: one queued verb and its state machine.
// - `command_queue.rs`: CommandQueue: FIFO, high-priority staging, repeats, insert mode.
// - `controller.rs`:    GameController: tick loop, tickets, events, attempt lifecycle.
// - `actions.rs`:       What each CommandAction does when it begins.
// - `verbs.rs`:         Public verb API with entity/type/broadcast targeting.
// - `event.rs`:         GameEvent / EventType and listener callbacks.
// - `presentation.rs`:  Requests to the presentation layer; HeadlessPresenter.
// - `config.rs`:        GameConfig, LevelConfig, declarative win/loss Conditions.
// - `error.rs`:         LevelError: the level-load validation failures.
// - `prng`:             Re-exported from `tilecraft_prng`: xoshiro256++ with SplitMix64 seeding.
//
// **Determinism.** Given a level config and a sequence of verbs, every run
// produces the same states and presentation requests. All randomness comes
// from the seeded `GameRng`; ordered collections are `BTreeMap`/`Vec`.
//
// The library never installs a logger; diagnostics go through `log`.

mod actions;
pub mod adjacency;
pub mod block;
pub mod command;
pub mod command_queue;
pub mod config;
pub mod controller;
pub mod entity;
pub mod error;
pub mod event;
pub mod fog;
pub mod level;
pub mod plane;
pub mod presentation;
pub use tilecraft_prng as prng;
pub mod shading;
pub mod types;
pub mod verbs;
