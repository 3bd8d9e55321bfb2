//! Linear systems over the naturals
//!
//! The α-threshold fallback extracts a system `A·X = B·X + C` whose rows
//! correspond to pattern-rule variables and whose columns correspond to
//! pumping indices; the right-hand side carries differences of exponents
//! between the right and left pattern substitutions. [`LinearSystem::solve_gauss`]
//! runs Gauss–Jordan restricted to the integers: a pivot must divide every
//! entry remaining in its column, otherwise the elimination aborts. The
//! system is *solved* only when the resulting form expresses each variable
//! as a linear combination of the free variables with **natural**
//! coefficients and constant.

#![forbid(unsafe_code)]

/// Construction errors. Illegal dimensions are caller bugs (§7 taxonomy) and
/// are reported as values, never panics.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LinSysError {
    #[error("linear system needs n > 0 and p > 0 (got n={n}, p={p})")]
    EmptySystem { n: usize, p: usize },
    #[error("matrix A must be {n}×{p}, row {row} has length {len}")]
    BadLhsRow { n: usize, p: usize, row: usize, len: usize },
    #[error("matrix B must be {n}×{cols}, row {row} has length {len}")]
    BadRhsRow { n: usize, cols: usize, row: usize, len: usize },
}

/// Square-ish integer system in the shape produced by the pattern engine.
#[derive(Clone, Debug)]
pub struct LinearSystem {
    n: usize,
    p: usize,
    /// `m = A − B[·][0..p]`, mutated in place by the elimination.
    m: Vec<Vec<i64>>,
    /// Constant column `B[·][p]`.
    c: Vec<i64>,
    /// `pivot_of[j] = Some(row)` once column `j` has been eliminated.
    pivot_of: Vec<Option<usize>>,
    solved: bool,
}

impl LinearSystem {
    /// Build from `A` (`n×p`) and `B` (`n×(p+1)`, last column is the
    /// constant term).
    pub fn new(n: usize, p: usize, a: Vec<Vec<i64>>, b: Vec<Vec<i64>>) -> Result<Self, LinSysError> {
        if n == 0 || p == 0 {
            return Err(LinSysError::EmptySystem { n, p });
        }
        if a.len() != n {
            return Err(LinSysError::BadLhsRow { n, p, row: a.len(), len: 0 });
        }
        if b.len() != n {
            return Err(LinSysError::BadRhsRow { n, cols: p + 1, row: b.len(), len: 0 });
        }
        for (row, r) in a.iter().enumerate() {
            if r.len() != p {
                return Err(LinSysError::BadLhsRow { n, p, row, len: r.len() });
            }
        }
        for (row, r) in b.iter().enumerate() {
            if r.len() != p + 1 {
                return Err(LinSysError::BadRhsRow { n, cols: p + 1, row, len: r.len() });
            }
        }
        let mut m = vec![vec![0i64; p]; n];
        let mut c = vec![0i64; n];
        for i in 0..n {
            for j in 0..p {
                m[i][j] = a[i][j] - b[i][j];
            }
            c[i] = b[i][p];
        }
        Ok(Self { n, p, m, c, pivot_of: vec![None; p], solved: false })
    }

    /// Gauss–Jordan over ℤ with divisibility-gated pivots; `true` iff a
    /// solved form with natural coefficients exists.
    pub fn solve_gauss(&mut self) -> bool {
        let mut used = vec![false; self.n];
        for j in 0..self.p {
            let Some(r) = (0..self.n).find(|&r| !used[r] && self.m[r][j] != 0) else {
                continue; // free column
            };
            let pivot = self.m[r][j];
            // The pivot must divide every other entry in its column.
            for i in 0..self.n {
                if i != r && self.m[i][j] % pivot != 0 {
                    return false;
                }
            }
            for i in 0..self.n {
                if i == r || self.m[i][j] == 0 {
                    continue;
                }
                let q = self.m[i][j] / pivot;
                for k in 0..self.p {
                    self.m[i][k] -= q * self.m[r][k];
                }
                self.c[i] -= q * self.c[r];
            }
            used[r] = true;
            self.pivot_of[j] = Some(r);
        }

        // Zero rows demand zero constants.
        for i in 0..self.n {
            if !used[i] && self.m[i].iter().all(|&v| v == 0) && self.c[i] != 0 {
                return false;
            }
        }

        // Read off: x_j = (c[r] − Σ_free m[r][k]·x_k) / pivot, all coefficients
        // must be natural.
        for j in 0..self.p {
            let Some(r) = self.pivot_of[j] else { continue };
            let pivot = self.m[r][j];
            if self.c[r] % pivot != 0 || self.c[r] / pivot < 0 {
                return false;
            }
            for k in 0..self.p {
                if k == j || self.m[r][k] == 0 {
                    continue;
                }
                if self.m[r][k] % pivot != 0 || -(self.m[r][k] / pivot) < 0 {
                    return false;
                }
            }
        }
        self.solved = true;
        true
    }

    /// The constant solution vector when the system is fully determined and
    /// solved; `None` otherwise.
    pub fn solution(&self) -> Option<Vec<i64>> {
        if !self.solved {
            return None;
        }
        let mut out = vec![0i64; self.p];
        for j in 0..self.p {
            let r = self.pivot_of[j]?;
            // A free variable elsewhere in the row makes the value symbolic.
            if (0..self.p).any(|k| k != j && self.m[r][k] != 0) {
                return None;
            }
            out[j] = self.c[r] / self.m[r][j];
        }
        Some(out)
    }
}
