//! Dependency graph for formula cells.
//!
//! Cells live in an arena addressed by `NodeId`. A formula node stores its
//! single-cell precedents as node ids and its range precedents unexpanded;
//! ranges are matched by subscription instead of one edge per member cell.
//!
//! # Edge Direction
//!
//! ```text
//! A → B  means  "B depends on A"  (A is a precedent of B)
//! ```
//!
//! "What must be recomputed if X changes?" follows outgoing edges (`succs`)
//! plus every range subscription whose zone contains X.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use cellgrid_core::{CellId, SheetId, Zone};
use rustc_hash::{FxHashMap, FxHashSet};

/// Stable index of a node in the arena. Slots are reused after removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

#[derive(Debug, Clone)]
struct Node {
    cell: CellId,
    /// Cells this formula reads directly
    preds: FxHashSet<NodeId>,
    /// Ranges this formula reads, never expanded here
    ranges: Vec<(SheetId, Zone)>,
    /// Formulas reading this cell directly
    succs: FxHashSet<NodeId>,
    is_formula: bool,
}

impl Node {
    fn new(cell: CellId) -> Self {
        Self { cell, preds: FxHashSet::default(), ranges: Vec::new(), succs: FxHashSet::default(), is_formula: false }
    }
}

/// One unit of recompute work, in dependency order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Evaluate(CellId),
    /// Members of one reference cycle, sorted. They are never evaluated.
    Cycle(Vec<CellId>),
}

/// Persistent dependency graph for formula cells.
///
/// # Invariants
///
/// 1. **Bidirectional consistency:** `a ∈ preds[b]` iff `b ∈ succs[a]`.
/// 2. **No dangling nodes:** a node that is not a formula and has no
///    dependents is freed.
/// 3. **Subscriptions mirror ranges:** `range_subs[s]` holds `(zone, b)`
///    exactly once per `(s, zone)` in `b.ranges`.
#[derive(Default, Debug, Clone)]
pub struct DepGraph {
    nodes: Vec<Option<Node>>,
    free: Vec<NodeId>,
    index: FxHashMap<CellId, NodeId>,
    range_subs: FxHashMap<SheetId, Vec<(Zone, NodeId)>>,
}

impl DepGraph {
    /// Create an empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    fn intern(&mut self, cell: CellId) -> NodeId {
        if let Some(&id) = self.index.get(&cell) {
            return id;
        }
        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id.0 as usize] = Some(Node::new(cell));
                id
            }
            None => {
                self.nodes.push(Some(Node::new(cell)));
                NodeId((self.nodes.len() - 1) as u32)
            }
        };
        self.index.insert(cell, id);
        id
    }

    /// Free the node if nothing needs it any more.
    fn release_if_unused(&mut self, id: NodeId) {
        let unused = self.node(id).map_or(false, |n| !n.is_formula && n.succs.is_empty());
        if !unused {
            return;
        }
        if let Some(node) = self.nodes[id.0 as usize].take() {
            self.index.remove(&node.cell);
            self.free.push(id);
        }
    }

    /// Returns true if this cell is registered as a formula.
    pub fn is_formula_cell(&self, cell: CellId) -> bool {
        self.index.get(&cell).and_then(|&id| self.node(id)).map_or(false, |n| n.is_formula)
    }

    /// All formula cells, sorted.
    pub fn formula_cells(&self) -> Vec<CellId> {
        let mut cells: Vec<CellId> =
            self.nodes.iter().flatten().filter(|n| n.is_formula).map(|n| n.cell).collect();
        cells.sort();
        cells
    }

    pub fn formula_cell_count(&self) -> usize {
        self.nodes.iter().flatten().filter(|n| n.is_formula).count()
    }

    /// Number of live arena slots (formulas plus referenced cells).
    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    /// Replace all edges for a formula cell atomically and mark it a formula.
    ///
    /// This is the primary mutation API. Old direct edges and range
    /// subscriptions are dropped before the new ones are added.
    pub fn replace_edges(
        &mut self,
        formula_cell: CellId,
        cells: impl IntoIterator<Item = CellId>,
        ranges: impl IntoIterator<Item = (SheetId, Zone)>,
    ) {
        let id = self.intern(formula_cell);
        self.detach(id);

        let mut new_preds = FxHashSet::default();
        for cell in cells {
            let pred = self.intern(cell);
            new_preds.insert(pred);
        }
        for &pred in &new_preds {
            if let Some(node) = self.node_mut(pred) {
                node.succs.insert(id);
            }
        }

        let mut new_ranges: Vec<(SheetId, Zone)> = Vec::new();
        for range in ranges {
            if !new_ranges.contains(&range) {
                new_ranges.push(range);
            }
        }
        for &(sheet, zone) in &new_ranges {
            self.range_subs.entry(sheet).or_default().push((zone, id));
        }

        if let Some(node) = self.node_mut(id) {
            node.preds = new_preds;
            node.ranges = new_ranges;
            node.is_formula = true;
        }
    }

    /// Drop a node's outgoing references (direct and range) and its formula flag.
    fn detach(&mut self, id: NodeId) {
        let Some(node) = self.node_mut(id) else { return };
        let preds: Vec<NodeId> = node.preds.drain().collect();
        let ranges = std::mem::take(&mut node.ranges);
        node.is_formula = false;

        for pred in preds {
            if let Some(p) = self.node_mut(pred) {
                p.succs.remove(&id);
            }
            if pred != id {
                self.release_if_unused(pred);
            }
        }
        for (sheet, _) in ranges {
            if let Some(subs) = self.range_subs.get_mut(&sheet) {
                subs.retain(|(_, sub)| *sub != id);
                if subs.is_empty() {
                    self.range_subs.remove(&sheet);
                }
            }
        }
    }

    /// Clear all edges for a cell (formula removed or cell deleted).
    pub fn clear_cell(&mut self, cell: CellId) {
        if let Some(&id) = self.index.get(&cell) {
            self.detach(id);
            self.release_if_unused(id);
        }
    }

    /// Remove every node on a sheet. Formulas elsewhere lose their edges
    /// into it and must be re-registered by the caller.
    pub fn remove_sheet(&mut self, sheet: SheetId) {
        let on_sheet: Vec<CellId> = self.index.keys().filter(|c| c.sheet == sheet).copied().collect();
        for cell in &on_sheet {
            self.clear_cell(*cell);
        }
        // Remaining nodes on the sheet are plain cells read by other sheets
        for cell in on_sheet {
            let Some(&id) = self.index.get(&cell) else { continue };
            let succs: Vec<NodeId> = self.node(id).map(|n| n.succs.iter().copied().collect()).unwrap_or_default();
            for succ in succs {
                if let Some(s) = self.node_mut(succ) {
                    s.preds.remove(&id);
                }
            }
            if let Some(node) = self.node_mut(id) {
                node.succs.clear();
            }
            self.release_if_unused(id);
        }
        if let Some(subs) = self.range_subs.remove(&sheet) {
            for (_, sub) in subs {
                if let Some(node) = self.node_mut(sub) {
                    node.ranges.retain(|(s, _)| *s != sheet);
                }
            }
        }
    }

    /// Formulas that read `cell` directly or through a range, sorted.
    pub fn direct_dependents(&self, cell: CellId) -> Vec<CellId> {
        let mut out: BTreeSet<CellId> = BTreeSet::new();
        if let Some(node) = self.index.get(&cell).and_then(|&id| self.node(id)) {
            out.extend(node.succs.iter().filter_map(|&s| self.node(s)).map(|n| n.cell));
        }
        if let Some(subs) = self.range_subs.get(&cell.sheet) {
            for (zone, sub) in subs {
                if zone.contains(cell.position()) {
                    if let Some(node) = self.node(*sub) {
                        out.insert(node.cell);
                    }
                }
            }
        }
        out.into_iter().collect()
    }

    /// Cells a formula reads directly, sorted. Ranges are not expanded.
    pub fn precedents(&self, cell: CellId) -> Vec<CellId> {
        let mut out: Vec<CellId> = self
            .index
            .get(&cell)
            .and_then(|&id| self.node(id))
            .map(|n| n.preds.iter().filter_map(|&p| self.node(p)).map(|p| p.cell).collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    /// The formula cells that must be recomputed when `seeds` change:
    /// seeds that are formulas plus every transitive dependent.
    pub fn dirty_closure(&self, seeds: impl IntoIterator<Item = CellId>) -> BTreeSet<CellId> {
        let mut visited: FxHashSet<CellId> = FxHashSet::default();
        let mut dirty = BTreeSet::new();
        let mut stack: Vec<CellId> = seeds.into_iter().collect();

        while let Some(cell) = stack.pop() {
            if !visited.insert(cell) {
                continue;
            }
            if self.is_formula_cell(cell) {
                dirty.insert(cell);
            }
            for dep in self.direct_dependents(cell) {
                if !visited.contains(&dep) {
                    stack.push(dep);
                }
            }
        }
        dirty
    }

    /// Order dirty formulas so precedents come first.
    ///
    /// Kahn's algorithm over the dirty subgraph, ties broken by `CellId`.
    /// When no cell is ready the remainder is split into strongly connected
    /// components; every true cycle is emitted as a `Step::Cycle` and its
    /// dependents continue normally.
    pub fn schedule(&self, dirty: &BTreeSet<CellId>) -> Vec<Step> {
        let mut out_edges: BTreeMap<CellId, Vec<CellId>> = BTreeMap::new();
        let mut in_degree: BTreeMap<CellId, usize> = dirty.iter().map(|&c| (c, 0)).collect();

        for &cell in dirty {
            let deps: Vec<CellId> = self.direct_dependents(cell).into_iter().filter(|d| dirty.contains(d)).collect();
            for dep in &deps {
                if let Some(deg) = in_degree.get_mut(dep) {
                    *deg += 1;
                }
            }
            out_edges.insert(cell, deps);
        }

        let mut ready: BinaryHeap<Reverse<CellId>> =
            in_degree.iter().filter(|(_, &d)| d == 0).map(|(&c, _)| Reverse(c)).collect();
        let mut done: FxHashSet<CellId> = FxHashSet::default();
        let mut steps = Vec::with_capacity(dirty.len());

        let release = |cell: CellId, in_degree: &mut BTreeMap<CellId, usize>, ready: &mut BinaryHeap<Reverse<CellId>>| {
            for dep in out_edges.get(&cell).into_iter().flatten() {
                if let Some(deg) = in_degree.get_mut(dep) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        ready.push(Reverse(*dep));
                    }
                }
            }
        };

        while done.len() < dirty.len() {
            if let Some(Reverse(cell)) = ready.pop() {
                if !done.insert(cell) {
                    continue;
                }
                steps.push(Step::Evaluate(cell));
                release(cell, &mut in_degree, &mut ready);
                continue;
            }

            // Stalled: everything left is on a cycle or downstream of one
            let remaining: BTreeSet<CellId> = dirty.iter().filter(|c| !done.contains(c)).copied().collect();
            let cycles = find_cycles(&remaining, &out_edges);
            if cycles.is_empty() {
                break;
            }
            for members in cycles {
                for &member in &members {
                    done.insert(member);
                    in_degree.insert(member, 0);
                }
                for &member in &members {
                    release(member, &mut in_degree, &mut ready);
                }
                // Cycle members were released into `ready`; they are done already
                steps.push(Step::Cycle(members));
            }
        }
        steps
    }

    /// Check all invariants. Panics if any are violated.
    ///
    /// Only available in test builds.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (slot, node) in self.nodes.iter().enumerate() {
            let Some(node) = node else { continue };
            let id = NodeId(slot as u32);
            assert_eq!(self.index.get(&node.cell), Some(&id), "index out of sync for {:?}", node.cell);
            for pred in &node.preds {
                let p = self.node(*pred).expect("dangling pred");
                assert!(p.succs.contains(&id), "Missing succ edge: {:?} -> {:?}", p.cell, node.cell);
            }
            for succ in &node.succs {
                let s = self.node(*succ).expect("dangling succ");
                assert!(s.preds.contains(&id), "Missing pred edge: {:?} -> {:?}", node.cell, s.cell);
            }
            assert!(node.is_formula || !node.succs.is_empty(), "unused node kept for {:?}", node.cell);
            for (sheet, zone) in &node.ranges {
                let count = self
                    .range_subs
                    .get(sheet)
                    .map_or(0, |subs| subs.iter().filter(|(z, s)| z == zone && *s == id).count());
                assert_eq!(count, 1, "range subscription mismatch for {:?}", node.cell);
            }
        }
        for subs in self.range_subs.values() {
            for (_, sub) in subs {
                assert!(self.node(*sub).map_or(false, |n| n.is_formula), "subscription from non-formula");
            }
        }
    }
}

/// Non-trivial strongly connected components (size > 1, or a self-loop)
/// of the subgraph induced by `cells`, each sorted, ordered by first member.
///
/// Iterative Tarjan's to avoid stack overflow on deep graphs.
fn find_cycles(cells: &BTreeSet<CellId>, edges: &BTreeMap<CellId, Vec<CellId>>) -> Vec<Vec<CellId>> {
    struct DfsFrame {
        cell: CellId,
        neighbours: Vec<CellId>,
        next_idx: usize,
    }

    let neighbours = |cell: CellId| -> Vec<CellId> {
        edges.get(&cell).into_iter().flatten().filter(|c| cells.contains(c)).copied().collect()
    };

    let mut index_counter: u32 = 0;
    let mut stack: Vec<CellId> = Vec::new();
    let mut on_stack: FxHashSet<CellId> = FxHashSet::default();
    let mut indices: FxHashMap<CellId, u32> = FxHashMap::default();
    let mut lowlinks: FxHashMap<CellId, u32> = FxHashMap::default();
    let mut sccs: Vec<Vec<CellId>> = Vec::new();

    for &root in cells {
        if indices.contains_key(&root) {
            continue;
        }

        indices.insert(root, index_counter);
        lowlinks.insert(root, index_counter);
        index_counter += 1;
        stack.push(root);
        on_stack.insert(root);
        let mut dfs_stack = vec![DfsFrame { cell: root, neighbours: neighbours(root), next_idx: 0 }];

        while let Some(frame) = dfs_stack.last_mut() {
            if frame.next_idx < frame.neighbours.len() {
                let w = frame.neighbours[frame.next_idx];
                frame.next_idx += 1;
                let v = frame.cell;

                if !indices.contains_key(&w) {
                    indices.insert(w, index_counter);
                    lowlinks.insert(w, index_counter);
                    index_counter += 1;
                    stack.push(w);
                    on_stack.insert(w);
                    dfs_stack.push(DfsFrame { cell: w, neighbours: neighbours(w), next_idx: 0 });
                } else if on_stack.contains(&w) {
                    let w_idx = indices[&w];
                    if let Some(v_low) = lowlinks.get_mut(&v) {
                        *v_low = (*v_low).min(w_idx);
                    }
                }
                continue;
            }

            // All neighbours explored: pop and propagate lowlink
            let Some(finished) = dfs_stack.pop() else { break };
            let v = finished.cell;
            let v_low = lowlinks[&v];
            if let Some(parent) = dfs_stack.last() {
                if let Some(parent_low) = lowlinks.get_mut(&parent.cell) {
                    *parent_low = (*parent_low).min(v_low);
                }
            }

            if v_low == indices[&v] {
                let mut scc = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack.remove(&w);
                    scc.push(w);
                    if w == v {
                        break;
                    }
                }
                let is_cycle = scc.len() > 1 || edges.get(&v).map_or(false, |e| e.contains(&v));
                if is_cycle {
                    scc.sort();
                    sccs.push(scc);
                }
            }
        }
    }

    sccs.sort();
    sccs
}
