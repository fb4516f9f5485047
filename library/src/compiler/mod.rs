//! Graph-to-rules compiler.
//!
//! A compile run orders and validates the nodes behind every gear of the
//! graph first, so a broken graph leaves the host untouched. Only then does it
//! clear the previous output of its namespace, install the entity's frame
//! timing and build each node in dependency order.

pub mod context;
pub mod emit;
pub mod frame_timing;
pub mod link;
pub mod order;

use log::{debug, info};

use crate::backend::{Backend, Namespace};
use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::model::entity::{EntityId, MechanismEntity};
use crate::model::graph::{MechanismGraph, NodeId, NodeKind};
use crate::util::timing::ScopedTimer;

use context::NodeContext;
use emit::Emitter;

/// Hands out `{prefix}{index}_` labels, unique within one compile run.
struct ScopeAllocator<'a> {
    prefix: &'a str,
    next: usize,
}

impl<'a> ScopeAllocator<'a> {
    fn new(prefix: &'a str) -> Self {
        Self { prefix, next: 0 }
    }

    fn allocate(&mut self) -> String {
        let scope = format!("{}{}_", self.prefix, self.next);
        self.next += 1;
        scope
    }
}

#[derive(Clone, Debug, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn namespace(&self) -> Namespace {
        self.config.namespace()
    }

    /// Compiles every gear of `graph` into rules on `entity`.
    ///
    /// Node scopes and resolved inputs are written back into `graph`; all other
    /// state lives in the backend afterwards.
    pub fn compile(
        &self,
        backend: &mut dyn Backend,
        entity: &EntityId,
        graph: &mut MechanismGraph,
        current_frame: i64,
    ) -> Result<(), CompileError> {
        let _timer = ScopedTimer::debug_lazy(|| format!("Compiling mechanism on {}", entity));

        let plan = self.plan(entity, graph)?;
        graph.reset();

        let namespace = self.namespace();
        backend.clear_namespace(&namespace, entity)?;
        let mut emitter = Emitter::new(backend, namespace);
        let frame_delta = frame_timing::install(&mut emitter, entity, current_frame)?;

        let mut scopes = ScopeAllocator::new(&self.config.scope_prefix);
        let mut built = 0;
        for (anchor, order) in &plan {
            let target = gear_target(graph, *anchor)?;
            for &id in order {
                if graph.scope(id).is_some() {
                    continue;
                }
                link::resolve(graph, id)?;

                let scope = scopes.allocate();
                let node = graph
                    .node_mut(id)
                    .ok_or_else(|| CompileError::invalid(format!("node {} vanished", id)))?;
                node.scope = Some(scope.clone());
                debug!("Building {} as {}", node.describe(id), scope);

                let mut ctx =
                    NodeContext::new(scope, target.clone(), frame_delta.clone(), &mut emitter);
                node.kind.as_node_mut().build(&mut ctx)?;
                built += 1;
            }
        }

        info!(
            "Compiled {} nodes for {} gears into {} rules on {} at frame {}",
            built,
            plan.len(),
            emitter.emitted(),
            entity,
            current_frame
        );
        Ok(())
    }

    /// Orders and validates the nodes behind every gear without touching the
    /// backend.
    pub fn plan(
        &self,
        entity: &EntityId,
        graph: &MechanismGraph,
    ) -> Result<Vec<(NodeId, Vec<NodeId>)>, CompileError> {
        let mut plan = Vec::new();
        for anchor in graph.anchors() {
            let target = gear_target(graph, anchor)?;
            if target.entity() != entity {
                return Err(CompileError::invalid(format!(
                    "gear {} targets {} outside entity {}",
                    anchor, target, entity
                )));
            }
            plan.push((anchor, order::gather(graph, anchor)?));
        }
        Ok(plan)
    }
}

fn gear_target(graph: &MechanismGraph, id: NodeId) -> Result<MechanismEntity, CompileError> {
    match graph.node(id).map(|n| &n.kind) {
        Some(NodeKind::Gear(gear)) => Ok(gear.target.clone()),
        _ => Err(CompileError::invalid(format!("node {} is not a gear", id))),
    }
}
