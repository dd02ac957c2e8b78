use super::snapshot::{Feed, FeedSource, GraphSnapshot, ScheduledNode};
use super::NodeRef;
use crate::error::RoutingError;
use crate::plugin::{PluginId, PluginInstance, PluginState};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Resolved edge endpoint: arena slot or one of the two fixed endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Input,
    Node(usize),
    Output,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    src: Slot,
    dst: Slot,
    gain: f32,
}

/// Public view of one edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingEdge {
    pub src: NodeRef,
    pub dst: NodeRef,
    pub gain: f32,
}

/// Directed acyclic graph of plugin nodes between the `Input` and `Output`
/// endpoints.
///
/// Nodes live in an arena indexed by slot; edges are slot pairs. Every edit
/// is validated before it is applied, so a rejected edit leaves the table
/// exactly as it was. The topological order is recomputed after each
/// successful edit. Control thread only.
#[derive(Debug)]
pub struct RoutingTable {
    nodes: Vec<Option<Arc<PluginInstance>>>,
    slots: HashMap<PluginId, usize>,
    /// Occupied slots in insertion order.
    insertion: Vec<usize>,
    edges: Vec<Edge>,
    order: Vec<usize>,
    max_nodes: usize,
}

impl RoutingTable {
    pub fn new(max_nodes: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(max_nodes),
            slots: HashMap::with_capacity(max_nodes),
            insertion: Vec::with_capacity(max_nodes),
            edges: Vec::new(),
            order: Vec::with_capacity(max_nodes),
            max_nodes,
        }
    }

    pub fn len(&self) -> usize {
        self.insertion.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insertion.is_empty()
    }

    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    pub fn contains(&self, id: PluginId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn instance(&self, id: PluginId) -> Option<&Arc<PluginInstance>> {
        self.slots
            .get(&id)
            .and_then(|&slot| self.nodes[slot].as_ref())
    }

    pub fn add_node(&mut self, instance: Arc<PluginInstance>) -> Result<(), RoutingError> {
        let id = instance.id();
        if self.slots.contains_key(&id) {
            return Err(RoutingError::DuplicateNode(NodeRef::Plugin(id)));
        }
        if self.insertion.len() >= self.max_nodes {
            return Err(RoutingError::CapacityExceeded {
                max: self.max_nodes,
            });
        }

        let slot = match self.nodes.iter().position(Option::is_none) {
            Some(free) => {
                self.nodes[free] = Some(instance);
                free
            }
            None => {
                self.nodes.push(Some(instance));
                self.nodes.len() - 1
            }
        };
        self.slots.insert(id, slot);
        self.insertion.push(slot);
        self.recompute_order();
        Ok(())
    }

    /// Removes a node and every edge touching it.
    pub fn remove_node(&mut self, id: PluginId) -> Result<Arc<PluginInstance>, RoutingError> {
        let slot = self
            .slots
            .remove(&id)
            .ok_or(RoutingError::UnknownNode(NodeRef::Plugin(id)))?;
        let target = Slot::Node(slot);
        self.edges.retain(|e| e.src != target && e.dst != target);
        self.insertion.retain(|&s| s != slot);
        let instance = self.nodes[slot]
            .take()
            .ok_or(RoutingError::UnknownNode(NodeRef::Plugin(id)))?;
        self.recompute_order();
        Ok(instance)
    }

    pub fn add_edge(&mut self, src: NodeRef, dst: NodeRef) -> Result<(), RoutingError> {
        self.add_edge_with_gain(src, dst, 1.0)
    }

    /// Adds `src -> dst`. The destination sums this input scaled by `gain`.
    pub fn add_edge_with_gain(
        &mut self,
        src: NodeRef,
        dst: NodeRef,
        gain: f32,
    ) -> Result<(), RoutingError> {
        if matches!(src, NodeRef::Output) || matches!(dst, NodeRef::Input) || !gain.is_finite()
        {
            return Err(RoutingError::InvalidEndpoint { src, dst });
        }
        let from = self.resolve_active(src)?;
        let to = self.resolve_active(dst)?;

        if self.edges.iter().any(|e| e.src == from && e.dst == to) {
            return Err(RoutingError::DuplicateEdge { src, dst });
        }
        if from == to || self.reaches(to, from) {
            return Err(RoutingError::CycleDetected { src, dst });
        }

        self.edges.push(Edge {
            src: from,
            dst: to,
            gain,
        });
        self.recompute_order();
        Ok(())
    }

    /// Removes `src -> dst`. Returns `false` if there was no such edge.
    pub fn remove_edge(&mut self, src: NodeRef, dst: NodeRef) -> Result<bool, RoutingError> {
        let from = self.resolve(src)?;
        let to = self.resolve(dst)?;
        let before = self.edges.len();
        self.edges.retain(|e| !(e.src == from && e.dst == to));
        let removed = self.edges.len() != before;
        if removed {
            self.recompute_order();
        }
        Ok(removed)
    }

    /// Drops every edge touching `id`, keeping the node. Returns how many
    /// edges were removed.
    pub fn detach(&mut self, id: PluginId) -> Result<usize, RoutingError> {
        let slot = Slot::Node(
            *self
                .slots
                .get(&id)
                .ok_or(RoutingError::UnknownNode(NodeRef::Plugin(id)))?,
        );
        let before = self.edges.len();
        self.edges.retain(|e| e.src != slot && e.dst != slot);
        let removed = before - self.edges.len();
        if removed > 0 {
            self.recompute_order();
        }
        Ok(removed)
    }

    /// Whether any edge references `id`.
    pub fn is_referenced(&self, id: PluginId) -> bool {
        match self.slots.get(&id) {
            Some(&slot) => {
                let node = Slot::Node(slot);
                self.edges.iter().any(|e| e.src == node || e.dst == node)
            }
            None => false,
        }
    }

    /// Plugin ids, sources before destinations. Ties follow insertion order.
    pub fn topological_order(&self) -> Vec<PluginId> {
        self.order
            .iter()
            .filter_map(|&slot| self.nodes[slot].as_ref().map(|i| i.id()))
            .collect()
    }

    pub fn edges(&self) -> Vec<RoutingEdge> {
        self.edges
            .iter()
            .map(|e| RoutingEdge {
                src: self.node_ref(e.src),
                dst: self.node_ref(e.dst),
                gain: e.gain,
            })
            .collect()
    }

    pub fn nodes(&self) -> Vec<PluginId> {
        self.insertion
            .iter()
            .filter_map(|&slot| self.nodes[slot].as_ref().map(|i| i.id()))
            .collect()
    }

    /// Builds the immutable view the audio thread processes from.
    pub fn snapshot(&self, epoch: u64) -> GraphSnapshot {
        let mut position = vec![usize::MAX; self.nodes.len()];
        for (pos, &slot) in self.order.iter().enumerate() {
            position[slot] = pos;
        }

        let feeds_into = |dst: Slot| -> Vec<Feed> {
            self.edges
                .iter()
                .filter(|e| e.dst == dst)
                .filter_map(|e| {
                    let source = match e.src {
                        Slot::Input => FeedSource::Input,
                        Slot::Node(slot) => FeedSource::Node(position[slot]),
                        Slot::Output => return None,
                    };
                    Some(Feed {
                        source,
                        gain: e.gain,
                    })
                })
                .collect()
        };

        let nodes = self
            .order
            .iter()
            .filter_map(|&slot| {
                self.nodes[slot].as_ref().map(|instance| ScheduledNode {
                    instance: Arc::clone(instance),
                    inputs: feeds_into(Slot::Node(slot)),
                })
            })
            .collect();

        GraphSnapshot {
            epoch,
            nodes,
            output: feeds_into(Slot::Output),
        }
    }

    fn resolve(&self, node: NodeRef) -> Result<Slot, RoutingError> {
        match node {
            NodeRef::Input => Ok(Slot::Input),
            NodeRef::Output => Ok(Slot::Output),
            NodeRef::Plugin(id) => self
                .slots
                .get(&id)
                .map(|&slot| Slot::Node(slot))
                .ok_or(RoutingError::UnknownNode(node)),
        }
    }

    fn resolve_active(&self, node: NodeRef) -> Result<Slot, RoutingError> {
        let slot = self.resolve(node)?;
        if let (Slot::Node(index), NodeRef::Plugin(id)) = (slot, node) {
            let active = self.nodes[index]
                .as_ref()
                .is_some_and(|i| i.state() == PluginState::Activated);
            if !active {
                return Err(RoutingError::InactivePlugin(id));
            }
        }
        Ok(slot)
    }

    fn node_ref(&self, slot: Slot) -> NodeRef {
        match slot {
            Slot::Input => NodeRef::Input,
            Slot::Output => NodeRef::Output,
            Slot::Node(index) => self.nodes[index]
                .as_ref()
                .map_or(NodeRef::Output, |i| NodeRef::Plugin(i.id())),
        }
    }

    /// Depth-first search along existing edges.
    fn reaches(&self, from: Slot, to: Slot) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if let Slot::Node(index) = current {
                if std::mem::replace(&mut visited[index], true) {
                    continue;
                }
            }
            stack.extend(
                self.edges
                    .iter()
                    .filter(|e| e.src == current)
                    .map(|e| e.dst),
            );
        }
        false
    }

    /// Kahn's algorithm over plugin slots.
    fn recompute_order(&mut self) {
        let mut indegree = vec![0usize; self.nodes.len()];
        for edge in &self.edges {
            if let (Slot::Node(_), Slot::Node(dst)) = (edge.src, edge.dst) {
                indegree[dst] += 1;
            }
        }

        let mut ready: VecDeque<usize> = self
            .insertion
            .iter()
            .copied()
            .filter(|&slot| indegree[slot] == 0)
            .collect();

        self.order.clear();
        while let Some(slot) = ready.pop_front() {
            self.order.push(slot);
            for edge in self.edges.iter().filter(|e| e.src == Slot::Node(slot)) {
                if let Slot::Node(dst) = edge.dst {
                    indegree[dst] -= 1;
                    if indegree[dst] == 0 {
                        ready.push_back(dst);
                    }
                }
            }
        }
        debug_assert_eq!(self.order.len(), self.insertion.len(), "routing cycle");
    }
}
