use super::EngineShared;
use crate::error::RoutingError;
use crate::graph::{GraphSnapshot, NodeRef, RoutingEdge, RoutingTable};
use crate::health::HealthReport;
use crate::plugin::{PluginId, PluginInstance};
use std::sync::Arc;

enum Retired {
    Snapshot(Arc<GraphSnapshot>),
    Instance(Arc<PluginInstance>),
}

/// Control-thread side of the engine.
///
/// Every successful routing edit rebuilds the snapshot and swaps it in.
/// Replaced snapshots and unloaded instances are parked until the audio
/// thread has moved past them, then dropped here by [`reclaim`](Self::reclaim)
/// so deallocation never happens on the audio thread.
pub struct GraphController {
    table: RoutingTable,
    shared: Arc<EngineShared>,
    epoch: u64,
    graveyard: Vec<(u64, Retired)>,
}

impl GraphController {
    pub(crate) fn new(max_nodes: usize, shared: Arc<EngineShared>) -> Self {
        Self {
            table: RoutingTable::new(max_nodes),
            shared,
            epoch: 0,
            graveyard: Vec::new(),
        }
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Epoch of the most recently published snapshot.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn add_node(&mut self, instance: Arc<PluginInstance>) -> Result<(), RoutingError> {
        self.table.add_node(instance).inspect_err(log_rejected)?;
        self.publish();
        Ok(())
    }

    /// Removes the node and its edges, then publishes. The returned instance
    /// may still be referenced by the audio thread; hand it to
    /// [`retire`](Self::retire) rather than dropping it.
    pub fn remove_node(&mut self, id: PluginId) -> Result<Arc<PluginInstance>, RoutingError> {
        let instance = self.table.remove_node(id).inspect_err(log_rejected)?;
        self.publish();
        Ok(instance)
    }

    pub fn add_edge(&mut self, src: NodeRef, dst: NodeRef) -> Result<(), RoutingError> {
        self.add_edge_with_gain(src, dst, 1.0)
    }

    pub fn add_edge_with_gain(
        &mut self,
        src: NodeRef,
        dst: NodeRef,
        gain: f32,
    ) -> Result<(), RoutingError> {
        self.table
            .add_edge_with_gain(src, dst, gain)
            .inspect_err(log_rejected)?;
        self.publish();
        Ok(())
    }

    pub fn remove_edge(&mut self, src: NodeRef, dst: NodeRef) -> Result<bool, RoutingError> {
        let removed = self.table.remove_edge(src, dst)?;
        if removed {
            self.publish();
        }
        Ok(removed)
    }

    pub fn detach(&mut self, id: PluginId) -> Result<usize, RoutingError> {
        let removed = self.table.detach(id)?;
        if removed > 0 {
            self.publish();
        }
        Ok(removed)
    }

    pub fn topological_order(&self) -> Vec<PluginId> {
        self.table.topological_order()
    }

    pub fn edges(&self) -> Vec<RoutingEdge> {
        self.table.edges()
    }

    pub fn is_referenced(&self, id: PluginId) -> bool {
        self.table.is_referenced(id)
    }

    pub fn instance(&self, id: PluginId) -> Option<&Arc<PluginInstance>> {
        self.table.instance(id)
    }

    /// Rebuilds the snapshot from the table and swaps it in.
    pub fn publish(&mut self) {
        self.epoch += 1;
        let snapshot = Arc::new(self.table.snapshot(self.epoch));
        let previous = self.shared.snapshot.swap(snapshot);
        self.graveyard
            .push((self.epoch, Retired::Snapshot(previous)));
        tracing::debug!(
            epoch = self.epoch,
            nodes = self.table.len(),
            "Published graph snapshot"
        );
        self.reclaim();
    }

    /// Parks an instance removed from the graph until the audio thread can
    /// no longer be inside it.
    pub fn retire(&mut self, instance: Arc<PluginInstance>) {
        self.graveyard
            .push((self.epoch, Retired::Instance(instance)));
        self.reclaim();
    }

    /// Frees everything the audio thread has moved past. Returns how many
    /// entries were released.
    pub fn reclaim(&mut self) -> usize {
        let before = self.graveyard.len();
        let shared = &self.shared;
        self.graveyard.retain(|(epoch, retired)| {
            if !shared.quiescent_since(*epoch) {
                return true;
            }
            match retired {
                Retired::Snapshot(snapshot) => {
                    tracing::trace!(epoch = snapshot.epoch, "Reclaimed graph snapshot");
                }
                Retired::Instance(instance) => {
                    // The host has already run the stop hook.
                    instance.mark_unloaded();
                    tracing::debug!(plugin = %instance.id(), "Reclaimed plugin instance");
                }
            }
            false
        });
        before - self.graveyard.len()
    }

    /// Entries still waiting for the audio thread.
    pub fn pending_reclaim(&self) -> usize {
        self.graveyard.len()
    }

    pub fn health_report(&self, dropped_midi: u64) -> HealthReport {
        let instances: Vec<&Arc<PluginInstance>> = self
            .table
            .nodes()
            .into_iter()
            .filter_map(|id| self.table.instance(id))
            .collect();
        self.shared.health.report(dropped_midi, instances)
    }

    /// Stops the audio thread from rendering. It outputs silence until
    /// [`resume`](Self::resume).
    pub fn halt(&self) {
        self.shared.halted.set(true);
    }

    pub fn resume(&self) {
        self.shared.halted.set(false);
    }

    pub fn is_halted(&self) -> bool {
        self.shared.halted.get()
    }
}

fn log_rejected(err: &RoutingError) {
    tracing::warn!(error = %err, "Rejected routing edit");
}
