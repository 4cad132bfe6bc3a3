//! Sparse symmetric positive-definite solver for the nodal dispersion
//! system: minimum-degree reordering, symbolic factorization into a
//! compressed-column lower-triangular pattern, numeric Cholesky, and
//! forward/back substitution.

use std::collections::{BTreeSet, HashMap};

use crate::error::{SolverError, SolverResult};

/// Reusable factorization of one adjacency structure.
///
/// Construction performs ordering and symbolic factorization once; each
/// time step then assembles coefficients (`begin`/`add_diag`/`add_offdiag`),
/// factors, and solves per species against the same pattern.
#[derive(Debug)]
pub struct SparseSymSolver {
    n: usize,
    /// perm[p] = original index of the node eliminated at position p.
    perm: Vec<usize>,
    /// inv[original] = elimination position.
    inv: Vec<usize>,
    /// Column pointers into `row_ind` (strict lower triangle, permuted).
    col_ptr: Vec<usize>,
    /// Row indices per column, ascending, all > column index.
    row_ind: Vec<usize>,
    /// Assembled off-diagonal values (A, then overwritten by L).
    lval: Vec<f64>,
    /// Assembled diagonal (A), overwritten by the Cholesky diagonal of L.
    diag: Vec<f64>,
    /// (col, row) in permuted indexing -> slot in `lval`.
    slot: HashMap<(usize, usize), usize>,
    /// Dense scratch for factorization and permuted solves.
    work: Vec<f64>,
    factored: bool,
}

impl SparseSymSolver {
    /// Build ordering and symbolic pattern from the undirected edges of
    /// the node/link adjacency structure.
    pub fn new(n: usize, edges: &[(usize, usize)]) -> SolverResult<Self> {
        let mut adj: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        for &(a, b) in edges {
            if a >= n || b >= n {
                return Err(SolverError::InvalidArg {
                    what: "edge endpoint out of range",
                });
            }
            if a != b {
                adj[a].insert(b);
                adj[b].insert(a);
            }
        }

        let (perm, patterns) = minimum_degree(adj);

        let mut inv = vec![0usize; n];
        for (p, &orig) in perm.iter().enumerate() {
            inv[orig] = p;
        }

        // Translate each column's fill pattern to elimination positions.
        let mut col_ptr = Vec::with_capacity(n + 1);
        let mut row_ind = Vec::new();
        col_ptr.push(0);
        for p in 0..n {
            let mut rows: Vec<usize> = patterns[perm[p]].iter().map(|&o| inv[o]).collect();
            rows.sort_unstable();
            debug_assert!(rows.iter().all(|&r| r > p));
            row_ind.extend_from_slice(&rows);
            col_ptr.push(row_ind.len());
        }

        let nnz = row_ind.len();
        let mut slot = HashMap::with_capacity(nnz);
        for p in 0..n {
            for s in col_ptr[p]..col_ptr[p + 1] {
                slot.insert((p, row_ind[s]), s);
            }
        }

        Ok(Self {
            n,
            perm,
            inv,
            col_ptr,
            row_ind,
            lval: vec![0.0; nnz],
            diag: vec![0.0; n],
            slot,
            work: vec![0.0; n],
            factored: false,
        })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Zero all coefficients ahead of a new assembly.
    pub fn begin(&mut self) {
        self.lval.fill(0.0);
        self.diag.fill(0.0);
        self.factored = false;
    }

    /// Accumulate into the diagonal entry of `node` (original indexing).
    pub fn add_diag(&mut self, node: usize, v: f64) {
        self.diag[self.inv[node]] += v;
    }

    /// Accumulate into the off-diagonal coupling of nodes `i` and `j`
    /// (original indexing). The pair must be an edge supplied to `new`.
    pub fn add_offdiag(&mut self, i: usize, j: usize, v: f64) -> SolverResult<()> {
        let (pi, pj) = (self.inv[i], self.inv[j]);
        let key = (pi.min(pj), pi.max(pj));
        match self.slot.get(&key) {
            Some(&s) => {
                self.lval[s] += v;
                Ok(())
            }
            None => Err(SolverError::InvalidArg {
                what: "off-diagonal entry outside symbolic pattern",
            }),
        }
    }

    /// Numeric Cholesky factorization (left-looking).
    ///
    /// A non-positive pivot signals an ill-conditioned or singular system
    /// and reports the offending row in original indexing.
    pub fn factor(&mut self) -> SolverResult<()> {
        let n = self.n;
        self.work.fill(0.0);

        // For each row r, a linked list of columns whose next unconsumed
        // nonzero sits in row r.
        let mut link: Vec<Option<usize>> = vec![None; n];
        let mut next: Vec<Option<usize>> = vec![None; n];
        let mut cursor: Vec<usize> = self.col_ptr[..n].to_vec();

        for j in 0..n {
            // Scatter column j of A (still raw values) into dense work.
            self.work[j] = self.diag[j];
            for s in self.col_ptr[j]..self.col_ptr[j + 1] {
                self.work[self.row_ind[s]] = self.lval[s];
            }

            // Apply updates from every earlier column k with L[j,k] != 0.
            let mut head = link[j].take();
            while let Some(k) = head {
                let after = next[k];
                let p = cursor[k];
                let ljk = self.lval[p];
                for s in p..self.col_ptr[k + 1] {
                    self.work[self.row_ind[s]] -= ljk * self.lval[s];
                }
                cursor[k] = p + 1;
                if cursor[k] < self.col_ptr[k + 1] {
                    let r = self.row_ind[cursor[k]];
                    next[k] = link[r];
                    link[r] = Some(k);
                }
                head = after;
            }

            let d = self.work[j];
            if d <= 0.0 {
                return Err(SolverError::NonPositivePivot { row: self.perm[j] });
            }
            let ljj = d.sqrt();
            self.diag[j] = ljj;
            self.work[j] = 0.0;

            for s in self.col_ptr[j]..self.col_ptr[j + 1] {
                let r = self.row_ind[s];
                self.lval[s] = self.work[r] / ljj;
                self.work[r] = 0.0;
            }

            if self.col_ptr[j] < self.col_ptr[j + 1] {
                let r = self.row_ind[self.col_ptr[j]];
                next[j] = link[r];
                link[r] = Some(j);
            }
        }

        self.factored = true;
        Ok(())
    }

    /// Solve L L^T x = b in place, original indexing on both ends.
    pub fn solve(&mut self, b: &mut [f64]) -> SolverResult<()> {
        if !self.factored {
            return Err(SolverError::InvalidArg {
                what: "solve called before factor",
            });
        }
        if b.len() != self.n {
            return Err(SolverError::InvalidArg {
                what: "right-hand side length mismatch",
            });
        }

        // Permute in.
        for p in 0..self.n {
            self.work[p] = b[self.perm[p]];
        }

        // Forward: L y = b.
        for j in 0..self.n {
            self.work[j] /= self.diag[j];
            let yj = self.work[j];
            for s in self.col_ptr[j]..self.col_ptr[j + 1] {
                self.work[self.row_ind[s]] -= self.lval[s] * yj;
            }
        }

        // Backward: L^T x = y.
        for j in (0..self.n).rev() {
            let mut sum = self.work[j];
            for s in self.col_ptr[j]..self.col_ptr[j + 1] {
                sum -= self.lval[s] * self.work[self.row_ind[s]];
            }
            self.work[j] = sum / self.diag[j];
        }

        // Permute out.
        for p in 0..self.n {
            b[self.perm[p]] = self.work[p];
        }
        Ok(())
    }
}

/// Minimum-degree elimination. Returns the elimination order and, per
/// original node, the set of uneliminated neighbors at its elimination
/// time (the node's L-column fill pattern).
fn minimum_degree(mut adj: Vec<BTreeSet<usize>>) -> (Vec<usize>, Vec<Vec<usize>>) {
    let n = adj.len();
    let mut eliminated = vec![false; n];
    let mut perm = Vec::with_capacity(n);
    let mut patterns: Vec<Vec<usize>> = vec![Vec::new(); n];

    for _ in 0..n {
        // Smallest current degree, ties broken by index for determinism.
        let mut best = usize::MAX;
        let mut best_deg = usize::MAX;
        for v in 0..n {
            if eliminated[v] {
                continue;
            }
            let deg = adj[v].iter().filter(|&&u| !eliminated[u]).count();
            if deg < best_deg {
                best_deg = deg;
                best = v;
            }
        }

        let v = best;
        eliminated[v] = true;
        perm.push(v);

        let nbrs: Vec<usize> = adj[v]
            .iter()
            .copied()
            .filter(|&u| !eliminated[u])
            .collect();

        // Eliminating v makes its remaining neighbors a clique.
        for (i, &a) in nbrs.iter().enumerate() {
            for &b in &nbrs[i + 1..] {
                adj[a].insert(b);
                adj[b].insert(a);
            }
        }

        patterns[v] = nbrs;
    }

    (perm, patterns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_edges(n: usize) -> Vec<(usize, usize)> {
        (0..n - 1).map(|i| (i, i + 1)).collect()
    }

    #[test]
    fn path_laplacian() {
        // 5-node path, matrix 2I - adjacency (plus 1 on end diagonals to
        // keep it positive definite): tridiagonal SPD.
        let n = 5;
        let mut solver = SparseSymSolver::new(n, &path_edges(n)).unwrap();
        solver.begin();
        for i in 0..n {
            solver.add_diag(i, 3.0);
        }
        for (a, b) in path_edges(n) {
            solver.add_offdiag(a, b, -1.0).unwrap();
        }
        solver.factor().unwrap();

        // Verify against a dense multiply: A x = b.
        let x_true = [1.0, -2.0, 0.5, 3.0, -1.0];
        let mut b = vec![0.0; n];
        for i in 0..n {
            b[i] = 3.0 * x_true[i];
            if i > 0 {
                b[i] -= x_true[i - 1];
            }
            if i + 1 < n {
                b[i] -= x_true[i + 1];
            }
        }
        solver.solve(&mut b).unwrap();
        for i in 0..n {
            assert!((b[i] - x_true[i]).abs() < 1e-10, "x[{i}] = {}", b[i]);
        }
    }

    #[test]
    fn star_graph_with_fill() {
        // Star center forces fill among leaves if eliminated first; the
        // minimum-degree ordering should eliminate leaves first instead.
        let edges = [(0, 1), (0, 2), (0, 3), (0, 4)];
        let mut solver = SparseSymSolver::new(5, &edges).unwrap();
        // Leaves have degree 1, so the center is eliminated last.
        assert_eq!(*solver.perm.last().unwrap(), 0);

        solver.begin();
        for i in 0..5 {
            solver.add_diag(i, 5.0);
        }
        for (a, b) in edges {
            solver.add_offdiag(a, b, -1.0).unwrap();
        }
        solver.factor().unwrap();

        let mut b = vec![1.0; 5];
        solver.solve(&mut b).unwrap();
        // Symmetry: all leaves get the same value.
        for i in 2..5 {
            assert!((b[i] - b[1]).abs() < 1e-12);
        }
        // Residual check on the center row: 5*x0 - sum(leaves) = 1.
        let r = 5.0 * b[0] - (b[1] + b[2] + b[3] + b[4]);
        assert!((r - 1.0).abs() < 1e-10);
    }

    #[test]
    fn cycle_graph_solvable() {
        // A 4-cycle produces one fill-in during elimination.
        let edges = [(0, 1), (1, 2), (2, 3), (3, 0)];
        let mut solver = SparseSymSolver::new(4, &edges).unwrap();
        solver.begin();
        for i in 0..4 {
            solver.add_diag(i, 4.0);
        }
        for (a, b) in edges {
            solver.add_offdiag(a, b, -1.0).unwrap();
        }
        solver.factor().unwrap();

        let mut b = vec![2.0, 2.0, 2.0, 2.0];
        solver.solve(&mut b).unwrap();
        // By symmetry every node solves to 1.
        for v in b {
            assert!((v - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn non_positive_pivot_reports_row() {
        let mut solver = SparseSymSolver::new(2, &[(0, 1)]).unwrap();
        solver.begin();
        solver.add_diag(0, 1.0);
        solver.add_diag(1, -1.0); // indefinite
        solver.add_offdiag(0, 1, 0.0).unwrap();
        let err = solver.factor().unwrap_err();
        assert!(matches!(err, SolverError::NonPositivePivot { row: 1 }));
    }

    #[test]
    fn solve_before_factor_rejected() {
        let mut solver = SparseSymSolver::new(2, &[(0, 1)]).unwrap();
        solver.begin();
        let mut b = vec![1.0, 1.0];
        assert!(solver.solve(&mut b).is_err());
    }
}
