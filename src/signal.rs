//! Signal Bus
//!
//! Dependency edges between parameters live here rather than in the tree.
//! The bus only plans waves; the tree applies their effects (see
//! `ContextTree::set_param`).

use std::collections::HashMap;

use crate::context::ParamId;
use crate::options::DEFAULT_MAX_WAVE_DEPTH;

/// What a dependent does when its controller changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    /// Re-resolve array dimensions
    Reshape,
    /// Re-resolve list extension columns
    Reschema,
    /// Observe only
    Notify,
}

/// Directed dependency of one parameter on another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub dependent: ParamId,
    pub controller: ParamId,
    pub effect: Effect,
}

/// Dependents reached in one wave, with the parameter that reached them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub dependent: ParamId,
    pub effects: Vec<Effect>,
    pub via: ParamId,
}

/// Outcome of one mutation: dependents notified, wave by wave
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Propagation {
    pub waves: Vec<Vec<ParamId>>,
}

impl Propagation {
    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    /// Every notified parameter in notification order
    pub fn notified(&self) -> impl Iterator<Item = ParamId> + '_ {
        self.waves.iter().flatten().copied()
    }
}

/// Registry of dependency edges
#[derive(Debug, Clone)]
pub struct SignalBus {
    edges: Vec<Edge>,
    by_controller: HashMap<ParamId, Vec<usize>>,
    max_depth: usize,
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WAVE_DEPTH)
    }
}

impl SignalBus {
    pub fn new(max_depth: usize) -> Self {
        Self {
            edges: Vec::new(),
            by_controller: HashMap::new(),
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn set_max_depth(&mut self, depth: usize) {
        self.max_depth = depth;
    }

    /// Record an edge; returns false if it was already present
    pub fn connect(&mut self, dependent: ParamId, controller: ParamId, effect: Effect) -> bool {
        let edge = Edge {
            dependent,
            controller,
            effect,
        };
        let indices = self.by_controller.entry(controller).or_default();
        if indices.iter().any(|&i| self.edges[i] == edge) {
            return false;
        }
        indices.push(self.edges.len());
        self.edges.push(edge);
        true
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn dependents(&self, controller: ParamId) -> impl Iterator<Item = &Edge> {
        self.by_controller
            .get(&controller)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
    }

    /// Dependents of every member of `wave`, each listed once, in edge order
    pub fn next_wave(&self, wave: &[ParamId]) -> Vec<Notice> {
        let mut next: Vec<Notice> = Vec::new();
        for &controller in wave {
            for edge in self.dependents(controller) {
                match next.iter_mut().find(|n| n.dependent == edge.dependent) {
                    Some(notice) => {
                        if !notice.effects.contains(&edge.effect) {
                            notice.effects.push(edge.effect);
                        }
                    }
                    None => next.push(Notice {
                        dependent: edge.dependent,
                        effects: vec![edge.effect],
                        via: controller,
                    }),
                }
            }
        }
        next
    }
}
