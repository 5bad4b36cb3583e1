use crate::state_machine::{Edge, State, StateName, SymbolId, SymbolTable};
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::Bfs;
use std::collections::{HashMap, HashSet};

/// Edge weight of the graph view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub symbol_id: SymbolId,
    /// `kind:ident=outcome`, or the raw id when the symbol is unknown
    pub label: String,
    /// The target state is terminal for this symbol
    pub terminal: bool,
}

/// Directed graph over the states of an automaton.
///
/// Used by validation for reachability and by the CLI for statistics and
/// Graphviz export. Nodes are state names; parallel edges are kept, one per
/// symbol.
pub struct AutomatonGraph {
    pub graph: StableGraph<StateName, GraphEdge>,

    /// State name to node lookup
    pub state_index: HashMap<StateName, NodeIndex>,
}

impl AutomatonGraph {
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            state_index: HashMap::new(),
        }
    }

    /// Build the view, keeping only the edges `include` accepts
    pub fn build<'a, S, E, F>(states: S, edges: E, symbols: &SymbolTable, include: F) -> Self
    where
        S: IntoIterator<Item = &'a State>,
        E: IntoIterator<Item = &'a Edge>,
        F: Fn(&Edge) -> bool,
    {
        let mut graph = Self::new();
        let mut terminal: HashMap<&str, &State> = HashMap::new();
        for state in states {
            graph.add_state(&state.name);
            terminal.insert(state.name.as_str(), state);
        }

        for edge in edges.into_iter().filter(|e| include(e)) {
            let label = symbols
                .get(&edge.symbol_id)
                .map(|s| s.to_string())
                .unwrap_or_else(|| edge.symbol_id.to_string());
            let is_terminal = terminal
                .get(edge.to_state.as_str())
                .is_some_and(|s| s.is_terminal_for(&edge.symbol_id));
            graph.add_edge(
                edge,
                GraphEdge {
                    symbol_id: edge.symbol_id.clone(),
                    label,
                    terminal: is_terminal,
                },
            );
        }
        graph
    }

    pub fn add_state(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.state_index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.state_index.insert(name.to_string(), idx);
        idx
    }

    /// Link two known states; edges touching unknown states are skipped
    pub fn add_edge(&mut self, edge: &Edge, weight: GraphEdge) -> Option<EdgeIndex> {
        if let (Some(&from_idx), Some(&to_idx)) = (
            self.state_index.get(&edge.from_state),
            self.state_index.get(&edge.to_state),
        ) {
            Some(self.graph.add_edge(from_idx, to_idx, weight))
        } else {
            None
        }
    }

    /// States reachable from `start` by breadth-first search, `start` included
    pub fn reachable_from(&self, start: &str) -> HashSet<StateName> {
        let Some(&start_idx) = self.state_index.get(start) else {
            return HashSet::new();
        };
        let mut reachable = HashSet::new();
        let mut bfs = Bfs::new(&self.graph, start_idx);
        while let Some(idx) = bfs.next(&self.graph) {
            if let Some(name) = self.graph.node_weight(idx) {
                reachable.insert(name.clone());
            }
        }
        reachable
    }

    /// Whether any edge out of a reachable state lands terminally
    pub fn has_terminal_edge_from(&self, states: &HashSet<StateName>) -> bool {
        self.graph.edge_indices().any(|idx| {
            let (Some((from, _)), Some(weight)) =
                (self.graph.edge_endpoints(idx), self.graph.edge_weight(idx))
            else {
                return false;
            };
            weight.terminal
                && self
                    .graph
                    .node_weight(from)
                    .is_some_and(|name| states.contains(name))
        })
    }

    /// States without outgoing edges
    pub fn find_sink_states(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph.edges_directed(idx, Direction::Outgoing).count() == 0)
            .filter_map(|idx| self.graph.node_weight(idx).map(String::as_str))
            .collect()
    }

    /// Export to DOT format for Graphviz
    pub fn to_dot(&self, rankdir: &str, initial: Option<&str>) -> String {
        let mut dot = "digraph Automaton {\n".to_string();
        dot.push_str(&format!("  rankdir={};\n", rankdir));
        dot.push_str("  node [shape=circle];\n\n");

        let mut names: Vec<&String> = self.state_index.keys().collect();
        names.sort();
        for name in names {
            let shape = if Some(name.as_str()) == initial {
                "doublecircle"
            } else {
                "circle"
            };
            dot.push_str(&format!("  \"{}\" [shape={}];\n", escape(name), shape));
        }

        dot.push('\n');

        for edge_idx in self.graph.edge_indices() {
            if let Some((from_idx, to_idx)) = self.graph.edge_endpoints(edge_idx)
                && let (Some(from), Some(to), Some(weight)) = (
                    self.graph.node_weight(from_idx),
                    self.graph.node_weight(to_idx),
                    self.graph.edge_weight(edge_idx),
                )
            {
                let style = if weight.terminal { ", style=bold" } else { "" };
                dot.push_str(&format!(
                    "  \"{}\" -> \"{}\" [label=\"{}\"{}];\n",
                    escape(from),
                    escape(to),
                    escape(&weight.label),
                    style
                ));
            }
        }

        dot.push_str("}\n");
        dot
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            total_states: self.graph.node_count(),
            total_edges: self.graph.edge_count(),
            self_loops: self
                .graph
                .edge_indices()
                .filter(|&idx| {
                    self.graph
                        .edge_endpoints(idx)
                        .is_some_and(|(from, to)| from == to)
                })
                .count(),
            terminal_edges: self
                .graph
                .edge_indices()
                .filter_map(|idx| self.graph.edge_weight(idx))
                .filter(|w| w.terminal)
                .count(),
            sink_states: self.find_sink_states().len(),
            has_cycles: petgraph::algo::is_cyclic_directed(&self.graph),
        }
    }
}

impl Default for AutomatonGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GraphStats {
    pub total_states: usize,
    pub total_edges: usize,
    pub self_loops: usize,
    pub terminal_edges: usize,
    pub sink_states: usize,
    pub has_cycles: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{Outcome, Symbol};

    fn fixture() -> (Vec<State>, Vec<Edge>, SymbolTable) {
        let go = Symbol::action("go", Outcome::Success);
        let back = Symbol::action("back", Outcome::Success);
        let mut b = State::new("b");
        b.add_terminal(go.id().clone());

        let states = vec![State::new("a"), b, State::new("c")];
        let edges = vec![
            Edge::new("a", "b", go.id().clone()),
            Edge::new("b", "a", back.id().clone()),
        ];
        let mut symbols = SymbolTable::new();
        symbols.insert(go.id().clone(), go);
        symbols.insert(back.id().clone(), back);
        (states, edges, symbols)
    }

    #[test]
    fn test_empty_graph() {
        let graph = AutomatonGraph::new();
        assert_eq!(graph.graph.node_count(), 0);
        assert!(graph.reachable_from("a").is_empty());
    }

    #[test]
    fn test_reachability() {
        let (states, edges, symbols) = fixture();
        let graph = AutomatonGraph::build(&states, &edges, &symbols, |_| true);

        let reachable = graph.reachable_from("a");
        assert!(reachable.contains("a"));
        assert!(reachable.contains("b"));
        assert!(!reachable.contains("c"));
        assert!(graph.has_terminal_edge_from(&reachable));
    }

    #[test]
    fn test_filtered_edges_are_left_out() {
        let (states, edges, symbols) = fixture();
        let graph = AutomatonGraph::build(&states, &edges, &symbols, |e| e.from_state != "a");

        assert_eq!(graph.reachable_from("a").len(), 1);
        assert!(!graph.has_terminal_edge_from(&graph.reachable_from("a")));
    }

    #[test]
    fn test_stats() {
        let (states, edges, symbols) = fixture();
        let stats = AutomatonGraph::build(&states, &edges, &symbols, |_| true).stats();
        assert_eq!(stats.total_states, 3);
        assert_eq!(stats.total_edges, 2);
        assert_eq!(stats.self_loops, 0);
        assert_eq!(stats.terminal_edges, 1);
        assert_eq!(stats.sink_states, 1);
        assert!(stats.has_cycles);
    }

    #[test]
    fn test_to_dot() {
        let (states, edges, symbols) = fixture();
        let graph = AutomatonGraph::build(&states, &edges, &symbols, |_| true);
        let dot = graph.to_dot("TB", Some("a"));

        assert!(dot.starts_with("digraph Automaton {"));
        assert!(dot.contains("rankdir=TB;"));
        assert!(dot.contains("\"a\" [shape=doublecircle];"));
        assert!(dot.contains("\"a\" -> \"b\" [label=\"action:go=success\", style=bold];"));
        assert!(dot.contains("\"b\" -> \"a\" [label=\"action:back=success\"];"));
    }
}
