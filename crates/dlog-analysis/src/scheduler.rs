//! Dependency-ordered analysis scheduling
//!
//! Analyses are named computations with declared dependencies. The scheduler
//! resolves a request in topological order over the dependency DAG, caches
//! every result by kind and only recomputes after an explicit
//! [`AnalysisScheduler::invalidate`].

use crate::config::AnalysisConfig;
use dlog_core::ast::Program;
use dlog_core::{EnvironmentError, TypeAnalysis, TypeEnvironment};
use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisKind {
    /// Declared types, relation signatures and functor overloads
    TypeEnvironment,
    /// Per-term types and the diagnostic log
    Type,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 2] = [AnalysisKind::TypeEnvironment, AnalysisKind::Type];

    pub fn name(self) -> &'static str {
        match self {
            AnalysisKind::TypeEnvironment => "type-environment",
            AnalysisKind::Type => TypeAnalysis::NAME,
        }
    }

    pub fn dependencies(self) -> &'static [AnalysisKind] {
        match self {
            AnalysisKind::TypeEnvironment => &[],
            AnalysisKind::Type => &[AnalysisKind::TypeEnvironment],
        }
    }

    fn index(self) -> NodeIndex {
        NodeIndex::new(self as usize)
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
pub enum AnalysisOutput {
    TypeEnvironment(TypeEnvironment),
    Type(TypeAnalysis),
}

impl AnalysisOutput {
    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisOutput::TypeEnvironment(_) => AnalysisKind::TypeEnvironment,
            AnalysisOutput::Type(_) => AnalysisKind::Type,
        }
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("analysis `{analysis}` needs `{dependency}`, which has not been computed")]
    MissingDependency {
        analysis: AnalysisKind,
        dependency: AnalysisKind,
    },
    #[error("analysis `{0}` has not been computed")]
    NotComputed(AnalysisKind),
    #[error("analysis dependencies form a cycle through `{0}`")]
    DependencyCycle(AnalysisKind),
    #[error("type environment: {0}")]
    Environment(#[from] EnvironmentError),
}

/// Runs analyses over one program and owns their results
pub struct AnalysisScheduler {
    program: Program,
    config: AnalysisConfig,
    /// Edges point from a dependency to its dependents
    graph: DiGraph<AnalysisKind, ()>,
    cache: IndexMap<AnalysisKind, AnalysisOutput>,
}

impl AnalysisScheduler {
    pub fn new(program: Program, config: AnalysisConfig) -> Self {
        let mut graph = DiGraph::new();
        for kind in AnalysisKind::ALL {
            graph.add_node(kind);
        }
        for kind in AnalysisKind::ALL {
            for dependency in kind.dependencies() {
                graph.add_edge(dependency.index(), kind.index(), ());
            }
        }
        Self {
            program,
            config,
            graph,
            cache: IndexMap::new(),
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Mutable access to the program
    ///
    /// Callers that change the program must invalidate the analyses the
    /// change affects; cached results are left untouched here.
    pub fn program_mut(&mut self) -> &mut Program {
        &mut self.program
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn is_cached(&self, kind: AnalysisKind) -> bool {
        self.cache.contains_key(&kind)
    }

    /// Cached analyses in the order they were computed
    pub fn cached(&self) -> impl Iterator<Item = AnalysisKind> + '_ {
        self.cache.keys().copied()
    }

    /// Compute `kind` and everything it depends on, reusing cached results
    pub fn ensure(&mut self, kind: AnalysisKind) -> Result<&AnalysisOutput, SchedulerError> {
        let mut needed = Vec::new();
        let reversed = Reversed(&self.graph);
        let mut dfs = Dfs::new(reversed, kind.index());
        while let Some(node) = dfs.next(reversed) {
            needed.push(self.graph[node]);
        }

        let order = toposort(&self.graph, None).map_err(|cycle| SchedulerError::DependencyCycle(self.graph[cycle.node_id()]))?;
        for node in order {
            let step = self.graph[node];
            if !needed.contains(&step) || self.is_cached(step) {
                continue;
            }
            let output = self.compute(step)?;
            self.cache.insert(step, output);
        }
        self.get(kind)
    }

    /// Compute every analysis
    pub fn run_all(&mut self) -> Result<(), SchedulerError> {
        for kind in AnalysisKind::ALL {
            self.ensure(kind)?;
        }
        Ok(())
    }

    fn compute(&self, kind: AnalysisKind) -> Result<AnalysisOutput, SchedulerError> {
        debug!(analysis = %kind, "running analysis");
        match kind {
            AnalysisKind::TypeEnvironment => Ok(AnalysisOutput::TypeEnvironment(TypeEnvironment::from_program(
                &self.program,
            )?)),
            AnalysisKind::Type => {
                let env = match self.cache.get(&AnalysisKind::TypeEnvironment) {
                    Some(AnalysisOutput::TypeEnvironment(env)) => env,
                    _ => {
                        return Err(SchedulerError::MissingDependency {
                            analysis: kind,
                            dependency: AnalysisKind::TypeEnvironment,
                        })
                    }
                };
                let mut analysis = TypeAnalysis::new(self.config.type_analysis.clone());
                analysis.run(&self.program, env);
                Ok(AnalysisOutput::Type(analysis))
            }
        }
    }

    /// Cached result of `kind`; never computes
    pub fn get(&self, kind: AnalysisKind) -> Result<&AnalysisOutput, SchedulerError> {
        self.cache.get(&kind).ok_or(SchedulerError::NotComputed(kind))
    }

    pub fn type_environment(&self) -> Result<&TypeEnvironment, SchedulerError> {
        match self.get(AnalysisKind::TypeEnvironment)? {
            AnalysisOutput::TypeEnvironment(env) => Ok(env),
            _ => Err(SchedulerError::NotComputed(AnalysisKind::TypeEnvironment)),
        }
    }

    pub fn type_analysis(&self) -> Result<&TypeAnalysis, SchedulerError> {
        match self.get(AnalysisKind::Type)? {
            AnalysisOutput::Type(analysis) => Ok(analysis),
            _ => Err(SchedulerError::NotComputed(AnalysisKind::Type)),
        }
    }

    /// Drop the cached result of `kind` and of every analysis depending on it
    ///
    /// Returns the dropped kinds.
    pub fn invalidate(&mut self, kind: AnalysisKind) -> Vec<AnalysisKind> {
        let mut dropped = Vec::new();
        let mut dfs = Dfs::new(&self.graph, kind.index());
        while let Some(node) = dfs.next(&self.graph) {
            let dependent = self.graph[node];
            if self.cache.shift_remove(&dependent).is_some() {
                dropped.push(dependent);
            }
        }
        debug!(analysis = %kind, dropped = dropped.len(), "invalidated");
        dropped
    }
}
