use crate::clause::{LMapBool, Lit};
use crate::core::Propagator;
use crate::subsume::eliminate_subsumed;

/// Translation-table sentinel: the old variable is pinned true by the
/// partial assignment.
pub const FIXED_TRUE: Lit = Lit::from_idx(u32::MAX - 2);
/// Translation-table sentinel: the old variable is pinned false.
pub const FIXED_FALSE: Lit = Lit::from_idx(u32::MAX - 3);

/// The residual formula of a non-conflicting partial assignment.
///
/// Extracting from a propagator produces a renumbered CNF over exactly the
/// open variables, representing "extend the current partial assignment to a
/// full model": satisfied clauses are gone, false literals are dropped, and
/// the survivors are re-encoded densely from literal 0. Translation tables
/// map between old and new literals in both directions; old literals fixed
/// by the assignment translate to [`FIXED_TRUE`]/[`FIXED_FALSE`].
///
/// The clause list is run through [`eliminate_subsumed`] before being
/// returned, so no reduced clause is a superset of another.
#[derive(Debug, Clone, Default)]
pub struct ReducedFormula {
    old_lit_true: LMapBool,
    old_lit_false: LMapBool,
    /// What pre-reduction literal does the given post-reduction literal
    /// represent?
    new_to_old: Vec<Lit>,
    /// What post-reduction literal does the given pre-reduction literal
    /// represent? May hold the fixed sentinels.
    old_to_new: Vec<Lit>,
    clauses: Vec<Vec<Lit>>,
    buffer: Vec<Lit>,
}

impl ReducedFormula {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract the reduced formula from `propagator`, which must not be
    /// conflicting. The extractor can be reused across calls.
    pub fn extract(&mut self, propagator: &Propagator) {
        debug_assert!(!propagator.is_conflicting());
        self.init(propagator);
        self.make_literal_maps(propagator);
        self.translate_binaries(propagator);
        self.translate_long_clauses(propagator);
        let reduced_vars = self.num_vars() as u32;
        eliminate_subsumed(&mut self.clauses, reduced_vars);
    }

    /// The reduced clauses, in new literal numbering.
    pub fn clauses(&self) -> &[Vec<Lit>] {
        &self.clauses
    }

    /// Number of variables after reduction.
    pub fn num_vars(&self) -> usize {
        self.new_to_old.len() / 2
    }

    /// Number of clauses after reduction.
    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// Translate a post-reduction literal back to its pre-reduction
    /// counterpart.
    pub fn to_old(&self, lnew: Lit) -> Lit {
        self.new_to_old[lnew.idx() as usize]
    }

    /// Translate a pre-reduction literal to its post-reduction counterpart,
    /// or to [`FIXED_TRUE`]/[`FIXED_FALSE`] when its variable is pinned.
    pub fn to_new(&self, lold: Lit) -> Lit {
        self.old_to_new[lold.idx() as usize]
    }

    fn init(&mut self, propagator: &Propagator) {
        let n_lits = 2 * propagator.num_vars();
        self.old_lit_true.clear();
        self.old_lit_false.clear();
        if n_lits > 0 {
            let top = Lit::from_idx(n_lits - 1);
            self.old_lit_true.reserve(top);
            self.old_lit_false.reserve(top);
        }
        for &l in propagator.trail() {
            self.old_lit_true.insert(l);
            self.old_lit_false.insert(!l);
        }
        self.new_to_old.clear();
        self.old_to_new.clear();
        self.clauses.clear();
    }

    /// Number the open variables densely; pinned variables map to the fixed
    /// sentinels, always as a positive/negative pair.
    fn make_literal_maps(&mut self, propagator: &Propagator) {
        let mut next_new = 0u32;
        for v in 0..propagator.num_vars() {
            let pos = Lit::from_idx(2 * v);
            if self.old_lit_true[pos] {
                self.old_to_new.push(FIXED_TRUE);
                self.old_to_new.push(FIXED_FALSE);
            } else if self.old_lit_false[pos] {
                self.old_to_new.push(FIXED_FALSE);
                self.old_to_new.push(FIXED_TRUE);
            } else {
                self.old_to_new.push(Lit::from_idx(next_new));
                self.old_to_new.push(Lit::from_idx(next_new + 1));
                self.new_to_old.push(pos);
                self.new_to_old.push(!pos);
                next_new += 2;
            }
        }
    }

    /// Emit every binary clause with two open literals, once (`l1 < l2`).
    fn translate_binaries(&mut self, propagator: &Propagator) {
        for l1 in propagator.all_literals() {
            if self.old_lit_false[l1] {
                // the partner is already true
                continue;
            }
            if self.old_lit_true[l1] {
                // the clause is satisfied
                continue;
            }
            for &l2 in propagator.binary_partners_of(l1) {
                if self.old_lit_true[l2] {
                    continue;
                }
                if l1 < l2 {
                    self.clauses.push(vec![self.to_new(l1), self.to_new(l2)]);
                }
            }
        }
    }

    fn translate_long_clauses(&mut self, propagator: &Propagator) {
        let db = propagator.long_clauses();
        for cref in db.refs() {
            self.translate_clause(db.lits(cref));
        }
    }

    /// Drop false literals; skip the clause entirely when satisfied. Unit
    /// propagation has already run to a fixed point, so at least two
    /// literals survive.
    fn translate_clause(&mut self, lits: &[Lit]) {
        self.buffer.clear();
        for &l in lits {
            if self.old_lit_true[l] {
                return;
            }
            if self.old_lit_false[l] {
                continue;
            }
            self.buffer.push(self.old_to_new[l.idx() as usize]);
        }
        debug_assert!(self.buffer.len() > 1);
        self.clauses.push(self.buffer.clone());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::builder::ModelBuilder;

    #[test]
    fn test_sentinels_are_distinct() {
        assert_ne!(FIXED_TRUE, FIXED_FALSE);
        assert_ne!(FIXED_TRUE, Lit::UNDEF);
        assert_ne!(FIXED_FALSE, Lit::UNDEF);
    }

    #[test]
    fn test_fixed_variables_are_projected_out() {
        let mut b = ModelBuilder::new();
        let x = b.add_variable();
        let y = b.add_variable();
        let z = b.add_variable();
        b.add_clause(&[x]).unwrap();
        b.add_clause(&[!x, y]).unwrap();
        b.add_clause(&[x, y, z]).unwrap();
        let p = Propagator::from_builder(&b);
        assert_eq!(p.trail(), &[x, y]);

        let mut red = ReducedFormula::new();
        red.extract(&p);
        // only z is open; everything else is satisfied
        assert_eq!(red.num_vars(), 1);
        assert_eq!(red.num_clauses(), 0);
        assert_eq!(red.to_new(x), FIXED_TRUE);
        assert_eq!(red.to_new(!x), FIXED_FALSE);
        assert_eq!(red.to_new(y), FIXED_TRUE);
        assert_eq!(red.to_new(!y), FIXED_FALSE);
        assert_eq!(red.to_new(z), Lit::from_idx(0));
        assert_eq!(red.to_new(!z), Lit::from_idx(1));
        assert_eq!(red.to_old(Lit::from_idx(0)), z);
        assert_eq!(red.to_old(Lit::from_idx(1)), !z);
    }

    #[test]
    fn test_false_literals_are_dropped_from_clauses() {
        let mut b = ModelBuilder::new();
        let x = b.add_variable();
        let y = b.add_variable();
        let z = b.add_variable();
        let w = b.add_variable();
        b.add_clause(&[x]).unwrap();
        b.add_clause(&[!x, y, z, w]).unwrap();
        b.add_clause(&[y, !w]).unwrap();
        let p = Propagator::from_builder(&b);
        assert_eq!(p.trail(), &[x]);

        let mut red = ReducedFormula::new();
        red.extract(&p);
        assert_eq!(red.num_vars(), 3);
        // {!x, y, z, w} loses !x; {y, !w} is open on both sides
        let mut clauses = red.clauses().to_vec();
        for c in &mut clauses {
            c.sort_unstable();
        }
        clauses.sort();
        assert_eq!(
            clauses,
            vec![
                vec![red.to_new(y), red.to_new(z), red.to_new(w)],
                vec![red.to_new(y), red.to_new(!w)],
            ]
        );
        // round trip on all open literals
        for l in p.all_literals() {
            if p.is_open(l) {
                assert_eq!(red.to_old(red.to_new(l)), l);
            }
        }
    }

    #[test]
    fn test_extractor_is_reusable() {
        let mut b = ModelBuilder::new();
        let x = b.add_variable();
        let y = b.add_variable();
        b.add_clause(&[x, y]).unwrap();
        let p = Propagator::from_builder(&b);

        let mut red = ReducedFormula::new();
        red.extract(&p);
        assert_eq!(red.num_vars(), 2);
        assert_eq!(red.num_clauses(), 1);
        red.extract(&p);
        assert_eq!(red.num_vars(), 2);
        assert_eq!(red.num_clauses(), 1);
    }
}
