//! Behavior trees for unit AI.
//!
//! Nodes are stateless: everything a node needs to remember lives in the
//! entity's components. That lets one tree be shared (behind an `Arc`) by
//! every entity of an archetype. "Running" only means "evaluate me again
//! next tick"; nothing suspends.

pub mod nodes;

use std::sync::Arc;

use bevy_ecs::prelude::*;

pub use nodes::{AggressiveSearchTarget, Attack, CheckTarget, Idle, MoveToAttackRange, Navigation, Succeed};

/// Result of executing a node for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Success,
    Failure,
    Running,
}

/// World access handed to nodes while the AI system runs.
pub struct BehaviorContext<'w> {
    pub world: &'w mut World,
    /// Seconds in this tick.
    pub dt: f32,
}

/// A behavior tree node.
pub trait BehaviorNode: Send + Sync {
    fn execute(&self, ctx: &mut BehaviorContext<'_>, entity: Entity) -> NodeStatus;
}

/// Behavior tree attached to an AI-driven entity.
#[derive(Component, Clone)]
pub struct AiController {
    pub root: Arc<dyn BehaviorNode>,
}

impl AiController {
    pub fn new(root: Arc<dyn BehaviorNode>) -> Self {
        Self { root }
    }
}

/// Runs children in order until one does not succeed.
pub struct Sequence {
    children: Vec<Box<dyn BehaviorNode>>,
}

impl Sequence {
    pub fn new(children: Vec<Box<dyn BehaviorNode>>) -> Self {
        Self { children }
    }
}

impl BehaviorNode for Sequence {
    fn execute(&self, ctx: &mut BehaviorContext<'_>, entity: Entity) -> NodeStatus {
        for child in &self.children {
            let status = child.execute(ctx, entity);
            if status != NodeStatus::Success {
                return status;
            }
        }
        NodeStatus::Success
    }
}

/// Runs children in order until one does not fail.
pub struct Selector {
    children: Vec<Box<dyn BehaviorNode>>,
}

impl Selector {
    pub fn new(children: Vec<Box<dyn BehaviorNode>>) -> Self {
        Self { children }
    }
}

impl BehaviorNode for Selector {
    fn execute(&self, ctx: &mut BehaviorContext<'_>, entity: Entity) -> NodeStatus {
        for child in &self.children {
            let status = child.execute(ctx, entity);
            if status != NodeStatus::Failure {
                return status;
            }
        }
        NodeStatus::Failure
    }
}

/// Runs every child each tick and always succeeds.
pub struct Parallel {
    children: Vec<Box<dyn BehaviorNode>>,
}

impl Parallel {
    pub fn new(children: Vec<Box<dyn BehaviorNode>>) -> Self {
        Self { children }
    }
}

impl BehaviorNode for Parallel {
    fn execute(&self, ctx: &mut BehaviorContext<'_>, entity: Entity) -> NodeStatus {
        for child in &self.children {
            child.execute(ctx, entity);
        }
        NodeStatus::Success
    }
}

/// Tree for melee infantry.
///
/// Movement branch: follow a move order, else chase the nearest visible
/// enemy, else idle. Combat branch runs alongside: keep or pick a target in
/// reach and hit it when the cooldown allows.
pub fn melee_unit_tree() -> Arc<dyn BehaviorNode> {
    Arc::new(Parallel::new(vec![
        Box::new(Selector::new(vec![
            Box::new(Navigation),
            Box::new(Sequence::new(vec![
                Box::new(AggressiveSearchTarget),
                Box::new(MoveToAttackRange),
            ])),
            Box::new(Idle),
        ])),
        Box::new(Sequence::new(vec![Box::new(CheckTarget), Box::new(Attack)])),
    ]))
}
