//! DAG view of a circuit for depth and layering analysis.

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex as PetNodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;

use crate::circuit::Circuit;
use crate::error::{IrError, IrResult};
use crate::instruction::Instruction;
use crate::qubit::QubitId;

/// Node index type for the circuit DAG.
pub type NodeIndex = PetNodeIndex<u32>;

/// A node in the circuit DAG.
#[derive(Debug, Clone, PartialEq)]
pub enum DagNode {
    /// Input node for a qubit wire.
    In(QubitId),
    /// Output node for a qubit wire.
    Out(QubitId),
    /// Operation node, tagged with its position in the circuit.
    Op {
        /// Position of the instruction in [`Circuit::instructions`].
        position: usize,
        /// The instruction itself.
        instruction: Instruction,
    },
}

impl DagNode {
    /// Check if this is an operation node.
    #[inline]
    pub fn is_op(&self) -> bool {
        matches!(self, DagNode::Op { .. })
    }
}

/// Directed acyclic graph over the qubit wires of a circuit.
///
/// Each wire runs from its `In` node through every operation touching that
/// qubit to its `Out` node. The `wire_front` index tracks the last node on
/// each wire so appending an operation is O(1) per qubit.
#[derive(Debug)]
pub struct CircuitDag {
    graph: DiGraph<DagNode, QubitId, u32>,
    qubit_outputs: FxHashMap<QubitId, NodeIndex>,
    wire_front: FxHashMap<QubitId, NodeIndex>,
}

impl CircuitDag {
    /// Build the DAG of a circuit.
    pub fn from_circuit(circuit: &Circuit) -> IrResult<Self> {
        let mut dag = Self {
            graph: DiGraph::default(),
            qubit_outputs: FxHashMap::default(),
            wire_front: FxHashMap::default(),
        };
        for q in 0..circuit.num_qubits() {
            dag.add_qubit(QubitId(q));
        }
        for (position, inst) in circuit.instructions().iter().enumerate() {
            dag.push(position, inst.clone())?;
        }
        Ok(dag)
    }

    fn add_qubit(&mut self, qubit: QubitId) {
        let in_node = self.graph.add_node(DagNode::In(qubit));
        let out_node = self.graph.add_node(DagNode::Out(qubit));
        self.graph.add_edge(in_node, out_node, qubit);
        self.qubit_outputs.insert(qubit, out_node);
        self.wire_front.insert(qubit, in_node);
    }

    fn push(&mut self, position: usize, instruction: Instruction) -> IrResult<NodeIndex> {
        let qubits = instruction.qubits.clone();
        let op_node = self.graph.add_node(DagNode::Op {
            position,
            instruction,
        });

        for qubit in qubits {
            let (Some(&out_node), Some(&prev_node)) =
                (self.qubit_outputs.get(&qubit), self.wire_front.get(&qubit))
            else {
                return Err(IrError::InvalidDag(format!(
                    "operation {position} touches unknown wire {qubit}"
                )));
            };

            let edge_id = self
                .graph
                .edges_directed(prev_node, Direction::Outgoing)
                .find(|e| *e.weight() == qubit && e.target() == out_node)
                .map(|e| e.id())
                .ok_or_else(|| {
                    IrError::InvalidDag(format!("missing front edge on wire {qubit}"))
                })?;
            self.graph.remove_edge(edge_id);
            self.graph.add_edge(prev_node, op_node, qubit);
            self.graph.add_edge(op_node, out_node, qubit);
            self.wire_front.insert(qubit, op_node);
        }

        Ok(op_node)
    }

    /// Number of operation nodes.
    pub fn num_ops(&self) -> usize {
        self.graph.node_weights().filter(|n| n.is_op()).count()
    }

    /// Per-operation depth, keyed by instruction position.
    ///
    /// The depth of an operation is one more than the deepest operation that
    /// precedes it on any shared wire.
    fn op_depths(&self) -> IrResult<FxHashMap<usize, usize>> {
        let order = petgraph::algo::toposort(&self.graph, None)
            .map_err(|_| IrError::InvalidDag("cycle detected in circuit graph".into()))?;

        let mut depths: FxHashMap<NodeIndex, usize> =
            FxHashMap::with_capacity_and_hasher(order.len(), Default::default());
        let mut by_position = FxHashMap::default();

        for node in order {
            let max_pred_depth = self
                .graph
                .edges_directed(node, Direction::Incoming)
                .map(|e| depths.get(&e.source()).copied().unwrap_or(0))
                .max()
                .unwrap_or(0);

            let node_depth = match &self.graph[node] {
                DagNode::Op { position, .. } => {
                    by_position.insert(*position, max_pred_depth + 1);
                    max_pred_depth + 1
                }
                DagNode::In(_) | DagNode::Out(_) => max_pred_depth,
            };
            depths.insert(node, node_depth);
        }

        Ok(by_position)
    }

    /// Length of the longest chain of operations linked by shared qubits.
    pub fn depth(&self) -> IrResult<usize> {
        Ok(self.op_depths()?.values().copied().max().unwrap_or(0))
    }

    /// Topological layering: `layers()[d]` holds the instruction positions
    /// at depth `d + 1`, in circuit order.
    pub fn layers(&self) -> IrResult<Vec<Vec<usize>>> {
        let depths = self.op_depths()?;
        let depth = depths.values().copied().max().unwrap_or(0);
        let mut layers = vec![Vec::new(); depth];
        let mut positions: Vec<_> = depths.into_iter().collect();
        positions.sort_unstable();
        for (position, d) in positions {
            layers[d - 1].push(position);
        }
        Ok(layers)
    }
}
