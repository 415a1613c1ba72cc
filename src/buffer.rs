//! # Agent Buffer
//!
//! Ping-pong storage for the agent set. Two arrays are allocated once; every
//! pass reads one as an immutable snapshot and writes the other, then the
//! read index flips. No agent is ever mutated in place, so per-agent work
//! can run in any order or in parallel.
//!
//! A third array holds the last committed step. It is the only state
//! exposed to readers, so an aborted step is never observed.

use crate::structs::{Agent, ConfigError, Execution};
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct AgentBuffer {
    buffers: [Vec<Agent>; 2],
    read: usize,
    committed: Vec<Agent>,
}

impl AgentBuffer {
    pub fn new(agents: Vec<Agent>) -> Self {
        AgentBuffer {
            buffers: [agents.clone(), agents.clone()],
            read: 0,
            committed: agents,
        }
    }

    /// Rebuilds a buffer from flat 8-float agent records.
    pub fn from_floats(data: &[f32]) -> Result<Self, ConfigError> {
        if data.len() % Agent::FLOATS != 0 {
            return Err(ConfigError::MisalignedBuffer { len: data.len() });
        }
        let agents = data
            .chunks_exact(Agent::FLOATS)
            .map(|chunk| {
                let mut record = [0.0; Agent::FLOATS];
                record.copy_from_slice(chunk);
                Agent::from_record(record)
            })
            .collect();
        Ok(AgentBuffer::new(agents))
    }

    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    /// Working snapshot the next pass will read.
    pub fn read(&self) -> &[Agent] {
        &self.buffers[self.read]
    }

    /// State as of the last commit.
    pub fn committed(&self) -> &[Agent] {
        &self.committed
    }

    /// Committed state as `[posX, posY, velX, velY, predX, predY, goalX, goalY]` per agent.
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.committed)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.committed)
    }

    /// Runs one pass: `reducer(i, snapshot)` produces agent `i`'s new record
    /// and a contact count. Returns the summed contacts.
    pub fn run_pass<F>(&mut self, execution: Execution, reducer: F) -> usize
    where
        F: Fn(usize, &[Agent]) -> (Agent, usize) + Sync,
    {
        let (front, back) = self.buffers.split_at_mut(1);
        let (snapshot, target) = if self.read == 0 {
            (&front[0], &mut back[0])
        } else {
            (&back[0], &mut front[0])
        };
        let snapshot: &[Agent] = snapshot;

        let contacts = match execution {
            Execution::Sequential => target
                .iter_mut()
                .enumerate()
                .map(|(i, slot)| {
                    let (agent, contacts) = reducer(i, snapshot);
                    *slot = agent;
                    contacts
                })
                .sum(),
            Execution::Parallel => target
                .par_iter_mut()
                .enumerate()
                .map(|(i, slot)| {
                    let (agent, contacts) = reducer(i, snapshot);
                    *slot = agent;
                    contacts
                })
                .sum(),
        };
        self.read ^= 1;
        contacts
    }

    /// Publishes the working snapshot as the new committed state.
    pub fn commit(&mut self) {
        self.committed.copy_from_slice(&self.buffers[self.read]);
    }

    /// Discards uncommitted passes.
    pub fn rollback(&mut self) {
        let read = self.read;
        self.buffers[read].copy_from_slice(&self.committed);
    }

    pub fn all_finite(&self) -> bool {
        self.committed.iter().all(Agent::is_finite)
    }
}
