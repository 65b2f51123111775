//! C6: connected-component financial-balance validator. Computes
//! connected components of the bipartite candidate-edge graph via
//! iterative BFS (spec §9 "use a queue, not recursion") and keeps only
//! the edges of components whose API/ERP cent sums agree exactly.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::model::{ApiRow, Edge, ErpRow, RowId};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum Node {
    Api(RowId),
    Erp(RowId),
}

/// Filter `edges` down to those belonging to a balanced component.
pub fn validate(edges: Vec<Edge>, api: &[ApiRow], erp: &[ErpRow]) -> Vec<Edge> {
    if edges.is_empty() {
        return edges;
    }

    let api_cents: HashMap<RowId, i64> = api.iter().map(|r| (r.api_row_id, r.api_cents)).collect();
    let erp_cents: HashMap<RowId, i64> = erp.iter().map(|r| (r.erp_row_id, r.erp_cents)).collect();

    let mut api_adj: HashMap<RowId, Vec<RowId>> = HashMap::new();
    let mut erp_adj: HashMap<RowId, Vec<RowId>> = HashMap::new();
    for edge in &edges {
        api_adj.entry(edge.api_row_id).or_default().push(edge.erp_row_id);
        erp_adj.entry(edge.erp_row_id).or_default().push(edge.api_row_id);
    }

    let mut component_of: HashMap<Node, usize> = HashMap::new();
    let mut balanced: Vec<bool> = Vec::new();
    let mut next_component = 0usize;

    let mut all_nodes: Vec<Node> = Vec::new();
    for api_id in api_adj.keys() {
        all_nodes.push(Node::Api(*api_id));
    }
    for erp_id in erp_adj.keys() {
        all_nodes.push(Node::Erp(*erp_id));
    }

    for &start in &all_nodes {
        if component_of.contains_key(&start) {
            continue;
        }
        let component_id = next_component;
        next_component += 1;

        let mut queue = VecDeque::new();
        let mut visited_api: HashSet<RowId> = HashSet::new();
        let mut visited_erp: HashSet<RowId> = HashSet::new();
        queue.push_back(start);
        component_of.insert(start, component_id);
        match start {
            Node::Api(id) => {
                visited_api.insert(id);
            }
            Node::Erp(id) => {
                visited_erp.insert(id);
            }
        }

        while let Some(node) = queue.pop_front() {
            match node {
                Node::Api(id) => {
                    if let Some(neighbors) = api_adj.get(&id) {
                        for &erp_id in neighbors {
                            if visited_erp.insert(erp_id) {
                                let n = Node::Erp(erp_id);
                                component_of.insert(n, component_id);
                                queue.push_back(n);
                            }
                        }
                    }
                }
                Node::Erp(id) => {
                    if let Some(neighbors) = erp_adj.get(&id) {
                        for &api_id in neighbors {
                            if visited_api.insert(api_id) {
                                let n = Node::Api(api_id);
                                component_of.insert(n, component_id);
                                queue.push_back(n);
                            }
                        }
                    }
                }
            }
        }

        let sum_api: i64 = visited_api.iter().map(|id| api_cents.get(id).copied().unwrap_or(0)).sum();
        let sum_erp: i64 = visited_erp.iter().map(|id| erp_cents.get(id).copied().unwrap_or(0)).sum();
        balanced.push(sum_api == sum_erp);
    }

    edges
        .into_iter()
        .filter(|edge| {
            let component_id = component_of[&Node::Api(edge.api_row_id)];
            balanced[component_id]
        })
        .collect()
}
