use crate::clause::{LMap, Lit};
use crate::Error;
use bit_vec::BitVec;

/// Accumulates a CNF formula for a propagator.
///
/// Clauses are canonicalized on the way in: literals are sorted, duplicates
/// removed, tautologies dropped. Variables are created implicitly when a
/// clause mentions them, or explicitly via
/// [`add_variable`](ModelBuilder::add_variable).
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    /// The next fresh positive literal; always `2 * num_vars`.
    next_lit: u32,
    unary: Vec<Lit>,
    binary: LMap<Vec<Lit>>,
    long: Vec<Vec<Lit>>,
    buffer: Vec<Lit>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh variable and return its positive literal.
    pub fn add_variable(&mut self) -> Lit {
        debug_assert!(
            self.next_lit < u32::MAX / 2 - 4,
            "variable index space exhausted"
        );
        let result = Lit::from_idx(self.next_lit);
        self.next_lit += 2;
        result
    }

    /// Make sure at least `n` variables exist.
    pub fn reserve_variables(&mut self, n: u32) {
        debug_assert!(n < u32::MAX / 4 - 4, "variable index space exhausted");
        self.next_lit = self.next_lit.max(2 * n);
    }

    pub fn num_vars(&self) -> u32 {
        self.next_lit / 2
    }

    /// Append one literal to the pending clause.
    pub fn add_literal(&mut self, l: Lit) {
        self.buffer.push(l);
    }

    /// Append several literals to the pending clause.
    pub fn add_literals(&mut self, lits: &[Lit]) {
        self.buffer.extend_from_slice(lits);
    }

    /// Close the pending clause and add it to the model.
    pub fn finalize_clause(&mut self) -> Result<(), Error> {
        self.commit()
    }

    /// Add a complete clause in one call.
    pub fn add_clause(&mut self, lits: &[Lit]) -> Result<(), Error> {
        self.buffer.extend_from_slice(lits);
        self.commit()
    }

    /// Check that `full_trail` assigns every variable exactly once and
    /// satisfies every clause. Returns a description of the first violation,
    /// or `None` if the trail is a model.
    pub fn verify_trail(&self, full_trail: &[Lit]) -> Option<String> {
        let n = self.num_vars() as usize;
        if full_trail.len() != n {
            return Some(format!(
                "trail has wrong length: expected {}, got {}",
                n,
                full_trail.len()
            ));
        }
        let mut seen = BitVec::from_elem(n, false);
        let mut assignment = BitVec::from_elem(n, false);
        for &l in full_trail {
            let v = l.var().idx() as usize;
            if v >= n {
                return Some(format!(
                    "trail contains variable {:?} which is not in the model",
                    l.var()
                ));
            }
            if seen[v] {
                return Some(format!("trail contains variable {:?} multiple times", l.var()));
            }
            seen.set(v, true);
            if l.sign() {
                assignment.set(v, true);
            }
        }
        self.verify_assignment(&assignment)
    }

    /// Check that the variable-indexed assignment satisfies every clause.
    /// Returns a description of the first violated clause, or `None`.
    pub fn verify_assignment(&self, assignment: &BitVec) -> Option<String> {
        let n = self.num_vars() as usize;
        if assignment.len() != n {
            return Some(format!(
                "assignment has wrong length: expected {}, got {}",
                n,
                assignment.len()
            ));
        }
        for &l in &self.unary {
            if !l.is_true_in(assignment) {
                return Some(format!("unary clause {:?} is not satisfied", l));
            }
        }
        for (l1, partners) in self.binary.iter() {
            if l1.is_true_in(assignment) {
                continue;
            }
            for &l2 in partners {
                if !l2.is_true_in(assignment) {
                    return Some(format!("binary clause {:?} {:?} is not satisfied", l1, l2));
                }
            }
        }
        for clause in &self.long {
            if !clause.iter().any(|l| l.is_true_in(assignment)) {
                return Some(format!("clause {:?} is not satisfied", clause));
            }
        }
        None
    }

    pub(crate) fn unary_clauses(&self) -> &[Lit] {
        &self.unary
    }

    pub(crate) fn binary_lists(&self) -> &LMap<Vec<Lit>> {
        &self.binary
    }

    pub(crate) fn long_clauses(&self) -> &[Vec<Lit>] {
        &self.long
    }

    /// Canonicalize the pending clause and file it by size.
    fn commit(&mut self) -> Result<(), Error> {
        if self.buffer.is_empty() {
            return Err(Error::EmptyClause);
        }
        self.buffer.sort_unstable();
        self.buffer.dedup();
        if self.buffer.windows(2).any(|w| !w[0] == w[1]) {
            // clause is a tautology
            self.buffer.clear();
            return Ok(());
        }
        let last = self.buffer[self.buffer.len() - 1];
        if last.idx() >= self.next_lit {
            debug_assert!(last.idx() < u32::MAX / 2 - 4, "variable index space exhausted");
            self.next_lit = last.abs().idx() + 2;
        }
        match self.buffer.len() {
            1 => self.unary.push(self.buffer[0]),
            2 => self.add_binary(self.buffer[0], self.buffer[1]),
            _ => self.long.push(self.buffer.clone()),
        }
        self.buffer.clear();
        Ok(())
    }

    fn add_binary(&mut self, l1: Lit, l2: Lit) {
        let top = Lit::from_idx(self.next_lit - 1);
        self.binary.reserve_default(top);
        self.binary[l1].push(l2);
        self.binary[l2].push(l1);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn lit(i: u32) -> Lit {
        Lit::from_idx(i)
    }

    #[test]
    fn test_fresh_variables() {
        let mut b = ModelBuilder::new();
        assert_eq!(b.num_vars(), 0);
        let x = b.add_variable();
        let y = b.add_variable();
        assert_eq!(x, lit(0));
        assert_eq!(y, lit(2));
        assert_eq!(b.num_vars(), 2);
        b.reserve_variables(5);
        assert_eq!(b.num_vars(), 5);
        b.reserve_variables(3);
        assert_eq!(b.num_vars(), 5);
    }

    #[test]
    fn test_clauses_grow_variable_count() {
        let mut b = ModelBuilder::new();
        b.add_clause(&[lit(0), lit(9)]).unwrap();
        assert_eq!(b.num_vars(), 5);
    }

    #[test]
    fn test_empty_clause_is_an_error() {
        let mut b = ModelBuilder::new();
        assert_eq!(b.finalize_clause(), Err(Error::EmptyClause));
        b.add_literal(lit(0));
        assert_eq!(b.finalize_clause(), Ok(()));
        assert_eq!(b.unary, vec![lit(0)]);
    }

    #[test]
    fn test_duplicates_are_removed() {
        let mut b = ModelBuilder::new();
        b.add_clause(&[lit(4), lit(0), lit(4)]).unwrap();
        // collapsed to a binary clause, stored in both adjacency lists
        assert!(b.long.is_empty());
        assert_eq!(b.binary[lit(0)], vec![lit(4)]);
        assert_eq!(b.binary[lit(4)], vec![lit(0)]);
    }

    #[test]
    fn test_tautologies_are_dropped() {
        let mut b = ModelBuilder::new();
        b.reserve_variables(2);
        b.add_clause(&[lit(0), lit(2), lit(3)]).unwrap();
        assert!(b.unary.is_empty());
        assert!(b.long.is_empty());
        // a dropped tautology does not grow the variable count either
        b.add_clause(&[lit(8), lit(9)]).unwrap();
        assert_eq!(b.num_vars(), 2);
    }

    #[test]
    fn test_incremental_clause_building() {
        let mut b = ModelBuilder::new();
        b.add_literal(lit(5));
        b.add_literals(&[lit(2), lit(7)]);
        b.finalize_clause().unwrap();
        assert_eq!(b.long, vec![vec![lit(2), lit(5), lit(7)]]);
    }

    #[test]
    fn test_verify_assignment_reports_violations() {
        let mut b = ModelBuilder::new();
        let x = b.add_variable();
        let y = b.add_variable();
        let z = b.add_variable();
        b.add_clause(&[x]).unwrap();
        b.add_clause(&[!x, y]).unwrap();
        b.add_clause(&[!x, !y, z]).unwrap();

        let mut a = BitVec::from_elem(3, false);
        assert!(b.verify_assignment(&a).unwrap().contains("unary"));
        a.set(0, true);
        assert!(b.verify_assignment(&a).unwrap().contains("binary"));
        a.set(1, true);
        assert!(b.verify_assignment(&a).is_some());
        a.set(2, true);
        assert_eq!(b.verify_assignment(&a), None);

        assert_eq!(b.verify_trail(&[x, y, z]), None);
        assert!(b.verify_trail(&[x, y]).unwrap().contains("length"));
        assert!(b.verify_trail(&[x, y, !y]).unwrap().contains("multiple"));
    }
}
