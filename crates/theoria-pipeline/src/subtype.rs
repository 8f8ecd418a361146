//! `subTypeOf` hierarchy over a term arena.
//!
//! Nodes are arena positions (`TermId.0`); edges point child → parent. Every
//! insertion is followed by a depth-first cycle check with a white/grey/black
//! colour map, and an edge that closes a cycle is taken back out.

use theoria_model::{ClassifiedTerm, TermId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubtypeError {
    #[error("term {0} is not part of this hierarchy")]
    UnknownTerm(TermId),
    #[error("edge {child} → {parent} would create a cycle")]
    WouldCycle { child: TermId, parent: TermId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

#[derive(Debug, Clone, Default)]
pub struct SubtypeGraph {
    parents: Vec<Vec<TermId>>,
}

impl SubtypeGraph {
    pub fn new(nodes: usize) -> Self {
        Self {
            parents: vec![Vec::new(); nodes],
        }
    }

    /// Graph of the `sub_type_of` edges in `terms`, keyed by position. Edges
    /// to ids outside the list are skipped; no cycle check is made.
    pub fn from_terms(terms: &[ClassifiedTerm]) -> Self {
        let mut graph = Self::new(terms.len());
        let position: std::collections::HashMap<TermId, usize> =
            terms.iter().enumerate().map(|(i, t)| (t.id, i)).collect();
        for (i, term) in terms.iter().enumerate() {
            if let Some(parent) = term.sub_type_of.and_then(|p| position.get(&p)) {
                graph.parents[i].push(TermId(*parent as u32));
            }
        }
        graph
    }

    /// Insert without the cycle check, for graphs that are only inspected.
    pub(crate) fn add_edge_unchecked(&mut self, from: TermId, to: TermId) {
        if from.index() < self.parents.len() && to.index() < self.parents.len() {
            self.parents[from.index()].push(to);
        }
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.parents.iter().map(Vec::len).sum()
    }

    pub fn edges(&self) -> impl Iterator<Item = (TermId, TermId)> + '_ {
        self.parents
            .iter()
            .enumerate()
            .flat_map(|(child, ps)| ps.iter().map(move |p| (TermId(child as u32), *p)))
    }

    /// Insert `child → parent`, or reject it (leaving the graph unchanged) if
    /// it would close a cycle. A self edge is a cycle.
    pub fn try_add_edge(&mut self, child: TermId, parent: TermId) -> Result<(), SubtypeError> {
        for id in [child, parent] {
            if id.index() >= self.parents.len() {
                return Err(SubtypeError::UnknownTerm(id));
            }
        }
        self.parents[child.index()].push(parent);
        if self.find_cycle().is_some() {
            self.parents[child.index()].pop();
            return Err(SubtypeError::WouldCycle { child, parent });
        }
        Ok(())
    }

    pub fn is_acyclic(&self) -> bool {
        self.find_cycle().is_none()
    }

    /// Nodes of one cycle, in edge order, if any.
    pub fn find_cycle(&self) -> Option<Vec<TermId>> {
        let mut color = vec![Color::White; self.parents.len()];
        let mut path = Vec::new();
        for start in 0..self.parents.len() {
            if color[start] == Color::White {
                if let Some(cycle) = self.visit(start, &mut color, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn visit(&self, node: usize, color: &mut [Color], path: &mut Vec<usize>) -> Option<Vec<TermId>> {
        color[node] = Color::Grey;
        path.push(node);
        for parent in &self.parents[node] {
            let next = parent.index();
            match color[next] {
                Color::Grey => {
                    let from = path.iter().position(|n| *n == next).unwrap_or(0);
                    return Some(path[from..].iter().map(|n| TermId(*n as u32)).collect());
                }
                Color::White => {
                    if let Some(cycle) = self.visit(next, color, path) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }
        path.pop();
        color[node] = Color::Black;
        None
    }

    /// Number of edges on the longest child → ancestor chain. Assumes the
    /// graph is acyclic (guaranteed by `try_add_edge`).
    pub fn max_depth(&self) -> usize {
        let mut memo: Vec<Option<usize>> = vec![None; self.parents.len()];
        (0..self.parents.len())
            .map(|n| self.depth_from(n, &mut memo, 0))
            .max()
            .unwrap_or(0)
    }

    fn depth_from(&self, node: usize, memo: &mut [Option<usize>], guard: usize) -> usize {
        if let Some(d) = memo[node] {
            return d;
        }
        // bounds recursion if handed a cyclic graph
        if guard > self.parents.len() {
            return 0;
        }
        let depth = self.parents[node]
            .iter()
            .map(|p| 1 + self.depth_from(p.index(), memo, guard + 1))
            .max()
            .unwrap_or(0);
        memo[node] = Some(depth);
        depth
    }

    pub fn parents_of(&self, child: TermId) -> &[TermId] {
        self.parents
            .get(child.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
