//! Arena tree for LQR-RRT*
//!
//! Nodes live in one `Vec` and refer to each other by index. The root is
//! always index 0. Nodes are never removed; rewiring only moves them.

use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::common::{Control, PlannerError, PlannerResult, State};
use crate::path_planning::config::Neighborhood;

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub state: State,
    /// Control applied on the last step of the incoming edge (zero at the root)
    pub control: Control,
    /// Cost-to-come from the root
    pub cost: f64,
    /// Cost of the incoming edge
    pub edge_cost: f64,
    pub parent: Option<usize>,
    children: Vec<usize>,
}

impl TreeNode {
    pub fn children(&self) -> &[usize] {
        &self.children
    }
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    pub const ROOT: usize = 0;

    pub fn new(root_state: State, root_control: Control) -> Self {
        Tree {
            nodes: vec![TreeNode {
                state: root_state,
                control: root_control,
                cost: 0.0,
                edge_cost: 0.0,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always holds its root
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.parent.is_some()).count()
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[Self::ROOT]
    }

    pub fn node(&self, index: usize) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn children(&self, index: usize) -> &[usize] {
        self.nodes.get(index).map(|n| n.children()).unwrap_or(&[])
    }

    /// `(parent, child)` index pairs
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.parent.map(|p| (p, i)))
    }

    /// Append a node under `parent`
    pub fn insert(&mut self, state: State, control: Control, parent: usize, edge_cost: f64) -> PlannerResult<usize> {
        self.check_index(parent)?;
        check_edge_cost(edge_cost)?;

        let index = self.nodes.len();
        let cost = self.nodes[parent].cost + edge_cost;
        self.nodes.push(TreeNode {
            state,
            control,
            cost,
            edge_cost,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(index);
        Ok(index)
    }

    /// Node minimizing `distance(state)`, earliest index on ties
    pub fn nearest<F>(&self, distance: F) -> usize
    where
        F: Fn(&State) -> f64,
    {
        let mut best = Self::ROOT;
        let mut best_dist = f64::INFINITY;
        for (i, node) in self.nodes.iter().enumerate() {
            let d = distance(&node.state);
            if d < best_dist {
                best_dist = d;
                best = i;
            }
        }
        best
    }

    /// Near set in ascending index order
    pub fn near<F>(&self, distance: F, neighborhood: Neighborhood) -> Vec<usize>
    where
        F: Fn(&State) -> f64,
    {
        let scored = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (OrderedFloat(distance(&node.state)), i))
            .filter(|(d, _)| !d.0.is_nan());

        match neighborhood {
            Neighborhood::Radius(r) => scored.filter(|(d, _)| d.0 <= r).map(|(_, i)| i).collect(),
            Neighborhood::KNearest(k) => scored
                .sorted()
                .take(k)
                .map(|(_, i)| i)
                .sorted()
                .collect(),
        }
    }

    /// Move `index` under `new_parent` with a new incoming edge cost and
    /// update the cost-to-come of the whole subtree
    pub fn reparent(&mut self, index: usize, new_parent: usize, edge_cost: f64) -> PlannerResult<()> {
        self.check_index(index)?;
        self.check_index(new_parent)?;
        check_edge_cost(edge_cost)?;
        if index == Self::ROOT {
            return Err(PlannerError::Tree("the root cannot be reparented".to_string()));
        }
        if self.is_ancestor(index, new_parent) {
            return Err(PlannerError::Tree(format!(
                "moving node {} under {} would create a cycle",
                index, new_parent
            )));
        }

        if let Some(old_parent) = self.nodes[index].parent {
            self.nodes[old_parent].children.retain(|&c| c != index);
        }
        self.nodes[new_parent].children.push(index);

        let node = &mut self.nodes[index];
        node.parent = Some(new_parent);
        node.edge_cost = edge_cost;

        self.propagate_cost(index);
        Ok(())
    }

    pub fn set_incoming_control(&mut self, index: usize, control: Control) -> PlannerResult<()> {
        self.check_index(index)?;
        self.nodes[index].control = control;
        Ok(())
    }

    /// True when `ancestor` lies on the path from `index` to the root
    /// (a node is its own ancestor)
    pub fn is_ancestor(&self, ancestor: usize, index: usize) -> bool {
        let mut current = Some(index);
        let mut steps = 0;
        while let Some(i) = current {
            if i == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                return false;
            }
            current = self.nodes.get(i).and_then(|n| n.parent);
        }
        false
    }

    /// Indices from `index` back to the root (inclusive)
    pub fn path_to_root(&self, index: usize) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = self.nodes.get(index).map(|_| index);
        while let Some(i) = current {
            path.push(i);
            if path.len() > self.nodes.len() {
                break;
            }
            current = self.nodes[i].parent;
        }
        path
    }

    /// Number of edges between `index` and the root
    pub fn depth(&self, index: usize) -> usize {
        self.path_to_root(index).len().saturating_sub(1)
    }

    /// Verify the arborescence and the cost-to-come equations
    pub fn check_invariants(&self) -> PlannerResult<()> {
        let n = self.nodes.len();
        if self.root().parent.is_some() {
            return Err(PlannerError::Tree("root has a parent".to_string()));
        }
        if self.root().cost != 0.0 {
            return Err(PlannerError::Tree("root cost is not zero".to_string()));
        }
        if self.edge_count() + 1 != n {
            return Err(PlannerError::Tree(format!(
                "{} nodes but {} edges",
                n,
                self.edge_count()
            )));
        }

        for (i, node) in self.nodes.iter().enumerate().skip(1) {
            let parent = node
                .parent
                .ok_or_else(|| PlannerError::Tree(format!("node {} has no parent", i)))?;
            self.check_index(parent)?;
            let listed = self.nodes[parent].children.iter().filter(|&&c| c == i).count();
            if listed != 1 {
                return Err(PlannerError::Tree(format!(
                    "node {} is listed {} times among the children of {}",
                    i, listed, parent
                )));
            }
            if self.path_to_root(i).last() != Some(&Self::ROOT) || self.path_to_root(i).len() > n {
                return Err(PlannerError::Tree(format!("node {} does not reach the root", i)));
            }
            let expected = self.nodes[parent].cost + node.edge_cost;
            if (node.cost - expected).abs() > 1e-9 * expected.abs().max(1.0) {
                return Err(PlannerError::Tree(format!(
                    "node {} cost {} differs from parent cost plus edge cost {}",
                    i, node.cost, expected
                )));
            }
            if node.cost < 0.0 {
                return Err(PlannerError::Tree(format!("node {} has negative cost", i)));
            }
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if let Some(&c) = node.children.iter().find(|&&c| self.nodes.get(c).and_then(|n| n.parent) != Some(i)) {
                return Err(PlannerError::Tree(format!(
                    "node {} lists {} as a child but is not its parent",
                    i, c
                )));
            }
        }
        Ok(())
    }

    /// Recompute `cost = parent.cost + edge_cost` for `index` and every descendant
    fn propagate_cost(&mut self, index: usize) {
        let mut stack = vec![index];
        while let Some(i) = stack.pop() {
            if let Some(parent) = self.nodes[i].parent {
                self.nodes[i].cost = self.nodes[parent].cost + self.nodes[i].edge_cost;
            }
            stack.extend(self.nodes[i].children.iter().copied());
        }
    }

    fn check_index(&self, index: usize) -> PlannerResult<()> {
        if index < self.nodes.len() {
            Ok(())
        } else {
            Err(PlannerError::Tree(format!(
                "node index {} out of range for a tree of {} nodes",
                index,
                self.nodes.len()
            )))
        }
    }
}

fn check_edge_cost(edge_cost: f64) -> PlannerResult<()> {
    if edge_cost.is_finite() && edge_cost >= 0.0 {
        Ok(())
    } else {
        Err(PlannerError::Tree(format!("invalid edge cost {}", edge_cost)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn s(x: f64) -> State {
        State::from_vec(vec![x])
    }

    fn u() -> Control {
        Control::zeros(1)
    }

    /// root(0) ── 1 ── 2 ── 3
    ///        └── 4
    fn sample_tree() -> Tree {
        let mut tree = Tree::new(s(0.0), u());
        tree.insert(s(1.0), u(), 0, 1.0).unwrap();
        tree.insert(s(2.0), u(), 1, 1.0).unwrap();
        tree.insert(s(3.0), u(), 2, 1.0).unwrap();
        tree.insert(s(1.5), u(), 0, 0.5).unwrap();
        tree
    }

    #[test]
    fn test_insert_sets_cost_and_links() {
        let tree = sample_tree();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.edge_count(), 4);
        assert_relative_eq!(tree.node(3).unwrap().cost, 3.0);
        assert_eq!(tree.children(0), &[1, 4]);
        assert_eq!(tree.depth(3), 3);
        assert_eq!(tree.path_to_root(3), vec![3, 2, 1, 0]);
        assert!(tree.check_invariants().is_ok());
    }

    #[test]
    fn test_insert_rejects_bad_parent_and_cost() {
        let mut tree = sample_tree();
        assert!(tree.insert(s(0.0), u(), 42, 1.0).is_err());
        assert!(tree.insert(s(0.0), u(), 1, -1.0).is_err());
        assert!(tree.insert(s(0.0), u(), 1, f64::NAN).is_err());
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_reparent_propagates_to_descendants() {
        let mut tree = sample_tree();
        // move 2 (and its child 3) under 4
        tree.reparent(2, 4, 0.25).unwrap();
        assert_eq!(tree.node(2).unwrap().parent, Some(4));
        assert_relative_eq!(tree.node(2).unwrap().cost, 0.75);
        assert_relative_eq!(tree.node(3).unwrap().cost, 1.75);
        assert_eq!(tree.children(1), &[] as &[usize]);
        assert_eq!(tree.children(4), &[2]);
        assert!(tree.check_invariants().is_ok());
    }

    #[test]
    fn test_reparent_rejects_cycles_and_root() {
        let mut tree = sample_tree();
        assert!(matches!(tree.reparent(1, 3, 0.1), Err(PlannerError::Tree(_))));
        assert!(tree.reparent(0, 4, 0.1).is_err());
        assert!(tree.reparent(2, 2, 0.1).is_err());
        assert!(tree.check_invariants().is_ok());
    }

    #[test]
    fn test_nearest_and_near() {
        let tree = sample_tree();
        let dist = |x: &State| (x[0] - 1.4).abs();
        assert_eq!(tree.nearest(dist), 4);
        assert_eq!(tree.near(dist, Neighborhood::KNearest(2)), vec![1, 4]);
        assert_eq!(tree.near(dist, Neighborhood::Radius(0.7)), vec![1, 2, 4]);
        assert_eq!(tree.near(dist, Neighborhood::KNearest(50)).len(), 5);
    }

    #[test]
    fn test_nearest_tie_goes_to_earliest() {
        let tree = sample_tree();
        assert_eq!(tree.nearest(|_| 1.0), 0);
    }

    #[test]
    fn test_ancestry() {
        let tree = sample_tree();
        assert!(tree.is_ancestor(1, 3));
        assert!(tree.is_ancestor(3, 3));
        assert!(!tree.is_ancestor(4, 3));
        assert!(tree.is_ancestor(0, 4));
    }
}
