//! Replay recording and playback.
//!
//! A replay stores the serialized starting state, every tick delta and
//! every command applied through [`Simulation::apply_command`], keyed by the
//! number of tick calls made before it. Replaying the stream from the
//! starting state reproduces the game exactly, paused ticks included.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::components::Command;
use crate::error::{GameError, Result};
use crate::math::Fixed;
use crate::simulation::Simulation;

/// A command and the tick call it preceded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayCommand {
    /// Number of tick calls made before the command was applied.
    pub step: u64,
    /// The command.
    pub command: Command,
}

/// Replay file format version.
pub const REPLAY_VERSION: u32 = 1;

/// A recorded game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    /// Format version.
    pub version: u32,
    /// Scenario name.
    pub scenario_id: String,
    /// Serialized starting state.
    pub initial_state: Vec<u8>,
    /// Commands in the order they were applied.
    pub commands: Vec<ReplayCommand>,
    /// Raw bits of every tick delta, paused ticks included.
    pub tick_deltas: Vec<i64>,
    /// Tick counter when recording stopped.
    pub final_tick: u64,
    /// State hash when recording stopped.
    pub final_hash: u64,
}

impl Replay {
    /// Start a replay from `initial_state`.
    ///
    /// # Errors
    /// Returns an error if the state cannot be serialized.
    pub fn new(scenario_id: impl Into<String>, initial_state: &Simulation) -> Result<Self> {
        Ok(Self {
            version: REPLAY_VERSION,
            scenario_id: scenario_id.into(),
            initial_state: initial_state.serialize()?,
            commands: Vec::new(),
            tick_deltas: Vec::new(),
            final_tick: 0,
            final_hash: 0,
        })
    }

    /// Record a command applied before the next tick.
    pub fn record_command(&mut self, command: Command) {
        self.commands.push(ReplayCommand {
            step: self.steps(),
            command,
        });
    }

    /// Record one tick call.
    pub fn record_tick(&mut self, dt: Fixed) {
        self.tick_deltas.push(dt.to_bits());
    }

    /// Record the end state.
    pub fn finalize(&mut self, final_tick: u64, final_hash: u64) {
        self.final_tick = final_tick;
        self.final_hash = final_hash;
    }

    /// Number of recorded tick calls.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.tick_deltas.len() as u64
    }

    /// Number of recorded commands.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Encode with bincode.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize replay: {e}")))
    }

    /// Decode from bincode, checking the format version.
    ///
    /// # Errors
    /// Returns an error if decoding fails or the version differs.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let replay: Self = bincode::deserialize(bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize replay: {e}")))?;
        if replay.version != REPLAY_VERSION {
            return Err(GameError::InvalidState(format!(
                "Replay version mismatch: expected {REPLAY_VERSION}, got {}",
                replay.version
            )));
        }
        Ok(replay)
    }

    /// Save to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_bytes()?)
            .map_err(|e| GameError::InvalidState(format!("Failed to write replay file: {e}")))
    }

    /// Load from a file.
    ///
    /// # Errors
    /// Returns an error if reading or decoding fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| GameError::InvalidState(format!("Failed to read replay file: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// The starting state.
    ///
    /// # Errors
    /// Returns an error if the stored state cannot be decoded.
    pub fn restore_initial_state(&self) -> Result<Simulation> {
        Simulation::deserialize(&self.initial_state)
    }

    /// Play the whole replay and compare the final hash.
    ///
    /// # Errors
    /// Returns an error if the starting state cannot be restored or a tick
    /// fails.
    pub fn verify(&self) -> Result<bool> {
        let mut player = ReplayPlayer::new(self.clone())?;
        player.run_to_end()?;
        Ok(player.simulation().state_hash() == self.final_hash)
    }
}

/// Steps a simulation through a replay.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    simulation: Simulation,
    step: u64,
    command_index: usize,
}

impl ReplayPlayer {
    /// Start playback from the replay's starting state.
    ///
    /// # Errors
    /// Returns an error if the starting state cannot be restored.
    pub fn new(replay: Replay) -> Result<Self> {
        let simulation = replay.restore_initial_state()?;
        Ok(Self {
            replay,
            simulation,
            step: 0,
            command_index: 0,
        })
    }

    fn apply_pending_commands(&mut self) {
        while let Some(record) = self.replay.commands.get(self.command_index) {
            if record.step > self.step {
                break;
            }
            let command = record.command;
            self.simulation.apply_command(command);
            self.command_index += 1;
        }
    }

    /// Apply the commands due before the next tick and run it.
    ///
    /// Returns whether more ticks remain.
    ///
    /// # Errors
    /// Returns an error if the tick fails.
    pub fn advance(&mut self) -> Result<bool> {
        let Some(&bits) = usize::try_from(self.step)
            .ok()
            .and_then(|i| self.replay.tick_deltas.get(i))
        else {
            self.apply_pending_commands();
            return Ok(false);
        };

        self.apply_pending_commands();
        self.simulation.tick(Fixed::from_bits(bits))?;
        self.step += 1;
        Ok(!self.is_finished())
    }

    /// Play every remaining tick and trailing command.
    ///
    /// # Errors
    /// Returns an error if a tick fails.
    pub fn run_to_end(&mut self) -> Result<()> {
        while self.advance()? {}
        self.apply_pending_commands();
        Ok(())
    }

    /// Tick calls played so far.
    #[must_use]
    pub const fn current_step(&self) -> u64 {
        self.step
    }

    /// Current state.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Whether every recorded tick has been played.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.step >= self.replay.steps()
    }
}
