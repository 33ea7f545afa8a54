use crate::clause::{LMap, Lit};
use crate::stamp::StampSet;

/// Remove every clause that is a (strict or equal) superset of another
/// clause; duplicates collapse to a single copy. Clause order is preserved
/// among the survivors.
///
/// Uses one watched literal per clause: a clause sits on the watch list of
/// some literal *not* contained in the candidate currently being tested.
/// When no such literal exists the watching clause is a subset of the
/// candidate, i.e. it subsumes it. Candidate membership is tracked with a
/// stamp set, so each test round is linear in the literals actually
/// visited.
pub fn eliminate_subsumed(clauses: &mut Vec<Vec<Lit>>, num_vars: u32) {
    SubsumptionChecker::new(clauses, num_vars).remove_subsumed();
}

struct SubsumptionChecker<'a> {
    clauses: &'a mut Vec<Vec<Lit>>,
    /// Literals of the candidate clause under test.
    in_clause: StampSet<Lit>,
    /// For each literal, the clauses currently watching it.
    watching: LMap<Vec<u32>>,
}

impl<'a> SubsumptionChecker<'a> {
    fn new(clauses: &'a mut Vec<Vec<Lit>>, num_vars: u32) -> Self {
        let n_lits = 2 * num_vars;
        let mut watching: LMap<Vec<u32>> = LMap::new();
        if n_lits > 0 {
            watching.reserve_default(Lit::from_idx(n_lits - 1));
        }
        for (ci, clause) in clauses.iter().enumerate() {
            debug_assert!(!clause.is_empty());
            watching[clause[0]].push(ci as u32);
        }
        SubsumptionChecker {
            clauses,
            in_clause: StampSet::with_universe(n_lits as usize),
            watching,
        }
    }

    fn remove_subsumed(mut self) {
        for index in 0..self.clauses.len() as u32 {
            self.empty_if_subsumed(index);
        }
        self.clauses.retain(|clause| !clause.is_empty());
    }

    /// Clear the candidate in place if some other clause subsumes it.
    fn empty_if_subsumed(&mut self, index: u32) {
        self.in_clause
            .assign(self.clauses[index as usize].iter().copied());
        for k in 0..self.clauses[index as usize].len() {
            let l = self.clauses[index as usize][k];
            if self.walk_watch_list(index, l) {
                self.clauses[index as usize].clear();
                return;
            }
        }
    }

    /// Walk the watchers of `l`, migrating each to a literal outside the
    /// candidate. Returns `true` if some watcher has no such literal, i.e.
    /// subsumes the candidate.
    fn walk_watch_list(&mut self, index: u32, l: Lit) -> bool {
        let Self {
            clauses,
            in_clause,
            watching,
        } = self;
        let watching_ptr: *mut LMap<Vec<u32>> = &mut *watching;
        let ws = &mut watching[l];
        let end = ws.len();
        let mut i = 0;
        let mut j = 0;
        let mut subsumed = false;
        'watchers: while i < end {
            let cother = ws[i];
            // we cannot subsume ourselves; stay in the watch list
            if cother == index {
                ws[j] = cother;
                j += 1;
                i += 1;
                continue;
            }
            // clauses emptied earlier are dropped without replacement
            let other = &clauses[cother as usize];
            if other.is_empty() {
                i += 1;
                continue;
            }
            for &ol in other {
                if !in_clause.contains(ol) {
                    // safe because `ol` is outside the candidate while `l`
                    // is inside it, so the lists are not aliased
                    debug_assert_ne!(ol, l);
                    unsafe { &mut (&mut *watching_ptr)[ol] }.push(cother);
                    i += 1;
                    continue 'watchers;
                }
            }
            // every literal of `cother` is in the candidate: subsumed
            subsumed = true;
            while i < end {
                ws[j] = ws[i];
                j += 1;
                i += 1;
            }
        }
        ws.truncate(j);
        subsumed
    }
}
