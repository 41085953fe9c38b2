use std::collections::{HashMap, HashSet};

use hsm_domain::{ComponentType, XName};
use petgraph::graph::{DiGraph, NodeIndex};

/// The xname hierarchy over a known set of components, used to resolve
/// propagation targets for power-state events (§4.1) without needing
/// the full discovery tree — parent/child is derived purely from xname
/// segment prefixes, so the graph only needs the flat id list.
pub struct ComponentGraph {
    graph: DiGraph<XName, ()>,
    index_of: HashMap<XName, NodeIndex>,
}

impl ComponentGraph {
    /// Build the hierarchy over `ids`. Ids whose parent is not itself in
    /// `ids` become roots (no edge) — this is expected for endpoints whose
    /// ancestor cabinets/chassis were never discovered as components.
    pub fn build(ids: &[XName]) -> Self {
        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();
        for id in ids {
            let idx = graph.add_node(id.clone());
            index_of.insert(id.clone(), idx);
        }
        for id in ids {
            if let Some(parent) = id.parent() {
                if let (Some(&pidx), Some(&cidx)) = (index_of.get(&parent), index_of.get(id)) {
                    graph.add_edge(pidx, cidx, ());
                }
            }
        }
        ComponentGraph { graph, index_of }
    }

    pub fn contains(&self, id: &XName) -> bool {
        self.index_of.contains_key(id)
    }

    /// Immediate children of `parent` among the known ids.
    pub fn children_of(&self, parent: &XName) -> Vec<XName> {
        match self.index_of.get(parent) {
            None => Vec::new(),
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, petgraph::Direction::Outgoing)
                .map(|n| self.graph[n].clone())
                .collect(),
        }
    }

    /// Immediate children of `parent` whose component type is in `types`.
    pub fn children_of_types(&self, parent: &XName, types: &[ComponentType]) -> Vec<XName> {
        self.children_of(parent)
            .into_iter()
            .filter(|c| types.contains(&c.component_type()))
            .collect()
    }

    /// Every descendant (transitive children) of `parent`.
    pub fn descendants_of(&self, parent: &XName) -> Vec<XName> {
        let Some(&start) = self.index_of.get(parent) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        let mut out = Vec::new();
        while let Some(idx) = stack.pop() {
            for n in self.graph.neighbors_directed(idx, petgraph::Direction::Outgoing) {
                if seen.insert(n) {
                    out.push(self.graph[n].clone());
                    stack.push(n);
                }
            }
        }
        out
    }
}

/// Power-propagation resolution (§4.1 Propagation rules).
///
/// Returns the full set of component ids (including `target` itself) that a
/// `ResourcePowerStateChanged`/`AlertSystemPower` event against `target`
/// (of type `target_type`, discovered under an endpoint of type
/// `endpoint_type`) should apply its state update to.
pub fn propagation_targets(
    endpoint_type: ComponentType,
    target: &XName,
    target_type: ComponentType,
    power_on: bool,
    graph: &ComponentGraph,
) -> Vec<XName> {
    let mut out = vec![target.clone()];
    match (endpoint_type, target_type) {
        (ComponentType::ChassisBmc, ComponentType::ComputeModule) => {
            if power_on {
                out.extend(graph.children_of_types(
                    target,
                    &[ComponentType::NodeEnclosure, ComponentType::NodeBmc, ComponentType::NodeBmcNic],
                ));
            } else {
                out.extend(graph.descendants_of(target));
            }
        }
        (ComponentType::ChassisBmc, ComponentType::RouterModule) => {
            out.extend(graph.descendants_of(target));
        }
        (ComponentType::NodeBmc, _) | (ComponentType::RouterBmc, _) | (ComponentType::PDUController, _) => {
            // Just the target; already included above.
        }
        _ => {}
    }
    out.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xn(s: &str) -> XName {
        XName::normalize(s).unwrap()
    }

    fn chassis_slot_fixture() -> Vec<XName> {
        vec![
            xn("x1c4b0"),
            xn("x1c4s4"),
            xn("x1c4s4b0"),
            xn("x1c4s4b1"),
            xn("x1c4s4b0n0"),
            xn("x1c4s4b0n1"),
            xn("x1c4s4b1n0"),
            xn("x1c4s4b1n1"),
        ]
    }

    #[test]
    fn power_off_cascades_to_every_descendant() {
        let ids = chassis_slot_fixture();
        let graph = ComponentGraph::build(&ids);
        let targets = propagation_targets(
            ComponentType::ChassisBmc,
            &xn("x1c4s4"),
            ComponentType::ComputeModule,
            false,
            &graph,
        );
        let mut expect = vec![
            "x1c4s4", "x1c4s4b0", "x1c4s4b1", "x1c4s4b0n0", "x1c4s4b0n1", "x1c4s4b1n0", "x1c4s4b1n1",
        ];
        expect.sort();
        let got: Vec<String> = targets.iter().map(|x| x.as_str().to_string()).collect();
        assert_eq!(got, expect);
    }

    #[test]
    fn power_on_is_limited_to_module_and_bmcs() {
        let ids = chassis_slot_fixture();
        let graph = ComponentGraph::build(&ids);
        let targets = propagation_targets(
            ComponentType::ChassisBmc,
            &xn("x1c4s4"),
            ComponentType::ComputeModule,
            true,
            &graph,
        );
        let mut expect = vec!["x1c4s4", "x1c4s4b0", "x1c4s4b1"];
        expect.sort();
        let got: Vec<String> = targets.iter().map(|x| x.as_str().to_string()).collect();
        assert_eq!(got, expect);
    }

    #[test]
    fn node_bmc_target_propagates_only_itself() {
        let ids = vec![xn("x1c4s4b0"), xn("x1c4s4b0n0")];
        let graph = ComponentGraph::build(&ids);
        let targets = propagation_targets(
            ComponentType::NodeBmc,
            &xn("x1c4s4b0n0"),
            ComponentType::Node,
            true,
            &graph,
        );
        assert_eq!(targets, vec![xn("x1c4s4b0n0")]);
    }
}
