/*****************************************************************************************[core.rs]
Copyright (c) 2003-2006, Niklas Een, Niklas Sorensson (MiniSat)
Copyright (c) 2007-2010, Niklas Sorensson (MiniSat)
Copyright (c) 2018-2018, Masaki Hara
Copyright (c) 2026, the propsat authors

Permission is hereby granted, free of charge, to any person obtaining a copy of this software and
associated documentation files (the "Software"), to deal in the Software without restriction,
including without limitation the rights to use, copy, modify, merge, publish, distribute,
sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all copies or
substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT
NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT
OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
**************************************************************************************************/

use crate::builder::ModelBuilder;
use crate::callbacks::AssignmentHandler;
use crate::clause::{lbool, CRef, LMap, Lit, LongClauses, Reason, VMap, Var};
use crate::Error;
use bit_vec::BitVec;
use smallvec::SmallVec;
use std::mem;

/// An entry in a literal's watch list.
///
/// The blocker is one of the clause's two watched literals; if it is
/// currently true the clause is satisfied and its literal array need not be
/// touched at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Watcher {
    blocker: Lit,
    cref: CRef,
}

type WatchList = SmallVec<[Watcher; 4]>;

#[derive(Debug, Clone, Copy)]
struct VarData {
    level: i32,
    trail_pos: u32,
}

impl Default for VarData {
    fn default() -> Self {
        Self {
            level: -1,
            trail_pos: !0,
        }
    }
}

/// One active decision level: where it starts in the trail, plus a stamp
/// used by conflict analysis to mark levels touched by the current conflict.
#[derive(Debug, Clone, Copy)]
struct LevelInfo {
    begin: u32,
    stamp: u32,
}

/// The trail with its per-variable assignment records and level markers.
#[derive(Debug, Clone)]
struct TrailState {
    /// Current assignment of each variable.
    ass: VMap<lbool>,
    /// Level and trail position of each assigned variable.
    data: VMap<VarData>,
    /// Generational marks used by conflict analysis and reason-graph
    /// queries; survive assignment and unassignment.
    stamps: VMap<u32>,
    /// Literals assigned true, in assignment order.
    trail: Vec<Lit>,
    /// Why each trail literal was assigned; parallel to `trail`.
    reasons: Vec<Reason>,
    /// Active decision levels; `levels[0]` always exists.
    levels: Vec<LevelInfo>,
}

impl TrailState {
    fn new(num_vars: u32) -> Self {
        let mut st = TrailState {
            ass: VMap::new(),
            data: VMap::new(),
            stamps: VMap::new(),
            trail: vec![],
            reasons: vec![],
            levels: vec![LevelInfo { begin: 0, stamp: 0 }],
        };
        if num_vars > 0 {
            let last = Var::from_idx(num_vars - 1);
            st.ass.reserve(last, lbool::UNDEF);
            st.data.reserve_default(last);
            st.stamps.reserve(last, 0);
        }
        st
    }

    #[inline(always)]
    fn value_lit(&self, l: Lit) -> lbool {
        self.ass[l.var()] ^ !l.sign()
    }

    #[inline(always)]
    fn is_true(&self, l: Lit) -> bool {
        self.value_lit(l) == lbool::TRUE
    }

    #[inline(always)]
    fn is_false(&self, l: Lit) -> bool {
        self.value_lit(l) == lbool::FALSE
    }

    #[inline(always)]
    fn is_open(&self, l: Lit) -> bool {
        self.value_lit(l) == lbool::UNDEF
    }

    #[inline(always)]
    fn level(&self, v: Var) -> i32 {
        self.data[v].level
    }

    #[inline(always)]
    fn trail_pos(&self, v: Var) -> usize {
        self.data[v].trail_pos as usize
    }

    #[inline(always)]
    fn current_level(&self) -> i32 {
        self.levels.len() as i32 - 1
    }

    /// Put `l` on the trail as true at `level` with the given reason.
    fn assign(&mut self, l: Lit, level: i32, reason: Reason) {
        debug_assert!(self.is_open(l), "assigning non-open literal {:?}", l);
        self.ass[l.var()] = lbool::new(l.sign());
        self.data[l.var()] = VarData {
            level,
            trail_pos: self.trail.len() as u32,
        };
        self.trail.push(l);
        self.reasons.push(reason);
    }

    /// Level-0 forced assignment; returns `false` on contradiction.
    fn assign_at_0(&mut self, forced_true: Lit) -> bool {
        let val = self.value_lit(forced_true);
        if val == lbool::UNDEF {
            self.assign(forced_true, 0, Reason::Unary(forced_true));
            true
        } else {
            val == lbool::TRUE
        }
    }
}

/// A unit-propagation engine with decision levels, conflict analysis,
/// clause learning and non-chronological backjumping.
///
/// The propagator never chooses decisions: the caller drives the search via
/// [`push_level`](Propagator::push_level),
/// [`pop_level`](Propagator::pop_level) and
/// [`resolve_conflicts`](Propagator::resolve_conflicts). Within any of
/// these calls propagation runs to a fixed point or a terminal conflict
/// before control returns.
///
/// Clones are deep copies of the entire state.
#[derive(Debug, Clone)]
pub struct Propagator {
    num_vars: u32,
    /// Forced literals from unary clauses, including learnt ones.
    unary: Vec<Lit>,
    /// Binary clauses as adjacency lists: `binary[l]` holds every `q` such
    /// that `{l, q}` is a clause.
    binary: LMap<Vec<Lit>>,
    /// All clauses of length >= 3, problem and learnt alike.
    long: LongClauses,
    /// `watches[l]` is walked when `l` becomes false.
    watches: LMap<WatchList>,
    st: TrailState,
    /// Next trail index to propagate; fixed point reached when it equals
    /// the trail length.
    qhead: usize,

    conflicting: bool,
    conflict_lit: Lit,
    conflict_reason: Reason,

    /// Conflict analysis reserves three consecutive stamp values per run.
    stamp_counter: u32,
    learn_buffer: Vec<Lit>,
    decision_buffer: Vec<(i32, Lit)>,
    minimize_stack: Vec<(Var, usize)>,
}

impl Default for Propagator {
    fn default() -> Self {
        Self::new()
    }
}

impl Propagator {
    /// An empty propagator with no variables or clauses.
    pub fn new() -> Self {
        Propagator {
            num_vars: 0,
            unary: vec![],
            binary: LMap::new(),
            long: LongClauses::new(),
            watches: LMap::new(),
            st: TrailState::new(0),
            qhead: 0,
            conflicting: false,
            conflict_lit: Lit::UNDEF,
            conflict_reason: Reason::Decision,
            stamp_counter: 0,
            learn_buffer: vec![],
            decision_buffer: vec![],
            minimize_stack: vec![],
        }
    }

    /// Build a propagator from a complete model.
    ///
    /// Installs watches, applies all unary and level-0-forced literals and
    /// runs propagation to a fixed point. The result may already be
    /// conflicting, in which case the formula is unsatisfiable.
    pub fn from_builder(model: &ModelBuilder) -> Self {
        let num_vars = model.num_vars();
        let mut binary = model.binary_lists().clone();
        for (_, list) in binary.iter_mut() {
            list.sort_unstable();
            list.dedup();
        }
        if num_vars > 0 {
            binary.reserve_default(Lit::from_idx(2 * num_vars - 1));
        }

        let total: usize = model.long_clauses().iter().map(|c| c.len() + 1).sum();
        let mut long = LongClauses::with_capacity(total + total / 2);
        for clause in model.long_clauses() {
            long.push(clause);
        }

        let mut p = Propagator {
            num_vars,
            unary: model.unary_clauses().to_vec(),
            binary,
            long,
            watches: LMap::new(),
            st: TrailState::new(num_vars),
            qhead: 0,
            conflicting: false,
            conflict_lit: Lit::UNDEF,
            conflict_reason: Reason::Decision,
            stamp_counter: 0,
            learn_buffer: vec![],
            decision_buffer: vec![],
            minimize_stack: vec![],
        };
        p.init_watches();
        if !p.conflicting {
            p.propagate();
        }
        p
    }

    // -------- QUERIES --------

    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    /// Truth value of `l` under the current trail.
    #[inline]
    pub fn value_of(&self, l: Lit) -> lbool {
        self.st.value_lit(l)
    }

    #[inline]
    pub fn is_true(&self, l: Lit) -> bool {
        self.st.is_true(l)
    }

    #[inline]
    pub fn is_false(&self, l: Lit) -> bool {
        self.st.is_false(l)
    }

    #[inline]
    pub fn is_open(&self, l: Lit) -> bool {
        self.st.is_open(l)
    }

    #[inline]
    pub fn is_open_or_true(&self, l: Lit) -> bool {
        !self.st.is_false(l)
    }

    /// The literals currently assigned true, in assignment order.
    ///
    /// The slice is invalidated by any mutating call.
    pub fn trail(&self) -> &[Lit] {
        &self.st.trail
    }

    /// The reasons of the trail literals, parallel to [`trail`](Propagator::trail).
    pub fn reasons(&self) -> &[Reason] {
        &self.st.reasons
    }

    /// The reason of a non-open literal.
    pub fn reason_for(&self, l: Lit) -> Reason {
        debug_assert!(!self.is_open(l));
        self.st.reasons[self.st.trail_pos(l.var())]
    }

    /// Decision level of `l`, or a negative value if `l` is open.
    pub fn level_of(&self, l: Lit) -> i32 {
        if self.is_open(l) {
            -1
        } else {
            self.st.level(l.var())
        }
    }

    /// Whether the non-open literal `l` was assigned as a decision.
    pub fn is_decision(&self, l: Lit) -> bool {
        self.reason_for(l).is_decision()
    }

    /// Trail index of a non-open literal.
    pub fn trail_index_of(&self, l: Lit) -> usize {
        debug_assert!(!self.is_open(l));
        self.st.trail_pos(l.var())
    }

    pub fn is_conflicting(&self) -> bool {
        self.conflicting
    }

    /// The conflicting literal and the clause that falsified it.
    pub fn conflict(&self) -> (Lit, Reason) {
        (self.conflict_lit, self.conflict_reason)
    }

    pub fn current_level(&self) -> i32 {
        self.st.current_level()
    }

    /// The decision literal of every level above 0, in level order.
    pub fn decisions(&self) -> Vec<Lit> {
        self.st.levels[1..]
            .iter()
            .map(|li| self.st.trail[li.begin as usize])
            .collect()
    }

    /// The trail segment belonging to the given level.
    pub fn lits_at_level(&self, level: u32) -> &[Lit] {
        let (begin, end) = self.level_bounds(level);
        &self.st.trail[begin..end]
    }

    pub fn current_level_lits(&self) -> &[Lit] {
        self.lits_at_level(self.st.current_level() as u32)
    }

    /// The reasons of the current level's trail segment.
    pub fn current_level_reasons(&self) -> &[Reason] {
        let (begin, end) = self.level_bounds(self.st.current_level() as u32);
        &self.st.reasons[begin..end]
    }

    fn level_bounds(&self, level: u32) -> (usize, usize) {
        let begin = self.st.levels[level as usize].begin as usize;
        let end = if level as usize >= self.st.levels.len() - 1 {
            self.st.trail.len()
        } else {
            self.st.levels[level as usize + 1].begin as usize
        };
        (begin, end)
    }

    /// All literals of unary clauses, including learnt ones.
    pub fn unary_clauses(&self) -> &[Lit] {
        &self.unary
    }

    /// Every `q` such that `{l, q}` is a binary clause.
    pub fn binary_partners_of(&self, l: Lit) -> &[Lit] {
        if self.binary.has(l) {
            &self.binary[l]
        } else {
            &[]
        }
    }

    /// The shared storage of all clauses of length >= 3.
    pub fn long_clauses(&self) -> &LongClauses {
        &self.long
    }

    /// All `2 * num_vars` literals. Variable indices are bounded well below
    /// `2^31`, so the doubled range cannot overflow.
    pub fn all_literals(&self) -> impl Iterator<Item = Lit> {
        (0..2 * self.num_vars).map(Lit::from_idx)
    }

    /// The complete assignment as a variable-indexed bit vector.
    ///
    /// Panics if the trail does not assign every variable.
    pub fn extract_assignment(&self) -> BitVec {
        let nv = self.num_vars as usize;
        if self.st.trail.len() != nv {
            panic!("extract_assignment: trail is incomplete");
        }
        let mut result = BitVec::from_elem(nv, false);
        for &l in &self.st.trail {
            if l.sign() {
                result.set(l.var().idx() as usize, true);
            }
        }
        result
    }

    // -------- DECISIONS --------

    /// Open a new decision level on `decision` and propagate to a fixed
    /// point. Returns `false` iff a conflict was reached.
    ///
    /// Panics if `decision` is already assigned.
    pub fn push_level(&mut self, decision: Lit) -> bool {
        if !self.st.is_open(decision) {
            panic!(
                "push_level: decision literal {:?} is already assigned",
                decision
            );
        }
        debug_assert!(!self.conflicting, "push_level with an unresolved conflict");
        let begin = self.st.trail.len() as u32;
        let new_level = self.st.levels.len() as i32;
        trace!("push level {} with decision {:?}", new_level, decision);
        self.st.levels.push(LevelInfo { begin, stamp: 0 });
        self.st.assign(decision, new_level, Reason::Decision);
        self.propagate()
    }

    /// Undo the highest decision level without learning. Also clears a
    /// pending conflict.
    ///
    /// Panics at level 0.
    pub fn pop_level(&mut self) {
        if self.st.levels.len() == 1 {
            panic!("pop_level called at decision level 0");
        }
        trace!("pop level {}", self.st.current_level());
        self.rollback_level(&mut (), false);
        self.qhead = self.st.trail.len();
        if self.conflicting {
            self.reset_conflict();
        }
    }

    /// Pop every level above 0.
    pub fn reset_to_zero(&mut self) {
        while self.st.current_level() > 0 {
            self.pop_level();
        }
    }

    // -------- PROPAGATION --------

    /// Run propagation to a fixed point. Returns `false` iff a conflict was
    /// found (now or earlier).
    pub fn propagate(&mut self) -> bool {
        if self.conflicting {
            return false;
        }
        while self.qhead < self.st.trail.len() {
            let p = self.st.trail[self.qhead];
            self.qhead += 1;
            if !self.propagate_lit(p) {
                debug!(
                    "conflict on {:?} at level {}",
                    self.conflict_lit,
                    self.st.current_level()
                );
                return false;
            }
        }
        true
    }

    fn propagate_lit(&mut self, ltrue: Lit) -> bool {
        if !self.propagate_binaries(ltrue) {
            return false;
        }
        self.propagate_longer(ltrue)
    }

    /// Propagate `ltrue` through the binary adjacency lists.
    fn propagate_binaries(&mut self, ltrue: Lit) -> bool {
        let lfalse = !ltrue;
        let Self {
            binary,
            st,
            conflicting,
            conflict_lit,
            conflict_reason,
            ..
        } = self;
        let level = st.current_level();
        for &other in &binary[lfalse] {
            let val = st.value_lit(other);
            if val == lbool::UNDEF {
                st.assign(other, level, Reason::Binary([lfalse, other]));
            } else if val == lbool::FALSE {
                *conflicting = true;
                *conflict_reason = Reason::Binary([lfalse, other]);
                *conflict_lit = other;
                return false;
            }
        }
        true
    }

    /// Propagate `ltrue` through the long-clause watch lists.
    ///
    /// Walks the watch list of the falsified literal, compacting it in
    /// place: satisfied and unit clauses keep their watcher, clauses with a
    /// replacement watch migrate to the replacement's list. On conflict the
    /// unprocessed suffix is kept verbatim.
    fn propagate_longer(&mut self, ltrue: Lit) -> bool {
        let lfalse = !ltrue;
        let Self {
            long,
            st,
            watches,
            conflicting,
            conflict_lit,
            conflict_reason,
            ..
        } = self;
        let level = st.current_level();
        let watches_ptr: *mut LMap<WatchList> = &mut *watches;
        let ws = &mut watches[lfalse];
        let mut i = 0;
        let mut j = 0;
        let end = ws.len();
        'watchers: while i < end {
            // Try to avoid inspecting the clause:
            let blocker = ws[i].blocker;
            if st.is_true(blocker) {
                ws[j] = ws[i];
                j += 1;
                i += 1;
                continue;
            }

            // Make sure the false literal is lits[1]:
            let cref = ws[i].cref;
            i += 1;
            let lits = long.lits_mut(cref);
            if lits[0] == lfalse {
                lits.swap(0, 1);
            }
            debug_assert_eq!(lits[1], lfalse);

            // If the other watched literal is true, the clause is satisfied.
            let first = lits[0];
            let w = Watcher {
                blocker: first,
                cref,
            };
            if first != blocker && st.is_true(first) {
                ws[j] = w;
                j += 1;
                continue;
            }

            // Look for a new watch:
            let len = lits.len();
            for k in 2..len {
                let repl = lits[k];
                if !st.is_false(repl) {
                    lits[1] = repl;
                    lits[k] = lfalse;
                    // safe because `repl != lfalse`, so the lists are not aliased
                    debug_assert_ne!(repl, lfalse);
                    unsafe { &mut (&mut *watches_ptr)[repl] }.push(w);
                    continue 'watchers;
                }
            }

            // Did not find a watch -- clause is unit under assignment:
            ws[j] = w;
            j += 1;
            let reason = Reason::Long {
                len: len as u32,
                cref,
            };
            if st.is_false(first) {
                *conflicting = true;
                *conflict_lit = first;
                *conflict_reason = reason;
                // Keep the unprocessed suffix:
                while i < end {
                    ws[j] = ws[i];
                    j += 1;
                    i += 1;
                }
            } else {
                st.assign(first, level, reason);
            }
        }
        ws.truncate(j);
        !*conflicting
    }

    // -------- CONFLICT RESOLUTION --------

    /// Resolve the pending conflict (if any) by learning and backjumping,
    /// without observing the induced state changes.
    pub fn resolve_conflicts(&mut self) -> bool {
        self.resolve_conflicts_with(&mut ())
    }

    /// Like [`resolve_conflicts`](Propagator::resolve_conflicts), but
    /// returns `Err(Error::Unsat)` instead of `false`.
    pub fn try_resolve_conflicts(&mut self) -> Result<(), Error> {
        if self.resolve_conflicts() {
            Ok(())
        } else {
            Err(Error::Unsat)
        }
    }

    /// Resolve the pending conflict by deriving a first-UIP clause, adding
    /// it to the formula and backjumping, then re-propagating; repeats if
    /// propagation conflicts again.
    ///
    /// All assignments of the conflicting level are undone implicitly and
    /// never reported. Every undone or newly forced assignment on lower
    /// levels is reported to `handler` exactly once.
    ///
    /// Returns `false` iff a conflict at level 0 was reached (the formula
    /// is unsatisfiable); the conflict state is kept in that case.
    pub fn resolve_conflicts_with<H: AssignmentHandler>(&mut self, handler: &mut H) -> bool {
        if !self.conflicting {
            return true;
        }
        loop {
            if self.st.levels.len() == 1 {
                debug!("conflict at level 0, formula is unsatisfiable");
                return false;
            }
            self.compute_conflict_clause();
            self.apply_conflict_clause(handler);
            self.reset_conflict();
            let tsize = self.qhead;
            let level_begin = self.st.levels[self.st.levels.len() - 1].begin as usize;
            if !self.propagate() {
                // the learnt clause led straight into another conflict;
                // everything already sitting on the target level will be
                // undone by the next round, so report it now
                for pos in (level_begin..tsize).rev() {
                    handler.assignment_undone(self.st.trail[pos]);
                }
            } else {
                for &l in &self.st.trail[tsize..] {
                    handler.assignment_forced(l);
                }
                return true;
            }
        }
    }

    fn reset_conflict(&mut self) {
        self.conflicting = false;
        self.conflict_lit = Lit::UNDEF;
        self.conflict_reason = Reason::Decision;
    }

    /// Undo the topmost level; `report` selects whether the handler hears
    /// about each undone assignment.
    fn rollback_level<H: AssignmentHandler>(&mut self, handler: &mut H, report: bool) {
        let st = &mut self.st;
        let begin = st.levels[st.levels.len() - 1].begin as usize;
        for pos in (begin..st.trail.len()).rev() {
            let l = st.trail[pos];
            if report {
                handler.assignment_undone(l);
            }
            st.ass[l.var()] = lbool::UNDEF;
        }
        st.trail.truncate(begin);
        st.reasons.truncate(begin);
        st.levels.pop();
    }

    /// Reserve three fresh stamp values, resetting all stamps first when
    /// the counter is about to overflow.
    fn increase_stamp(&mut self) -> u32 {
        if self.stamp_counter >= u32::MAX - 6 {
            for (_, s) in self.st.stamps.iter_mut() {
                *s = 0;
            }
            for lvl in self.st.levels.iter_mut() {
                lvl.stamp = 0;
            }
            self.stamp_counter = 0;
        }
        self.stamp_counter += 3;
        self.stamp_counter
    }

    /// Classify the literals of `reason` for the conflict at `level`:
    /// current-level literals are stamped and counted, literals of lower
    /// positive levels are stamped, their levels marked, and collected into
    /// the learn buffer; level-0 literals are dropped.
    fn stamp_and_count(&mut self, level: i32, reason: Reason) -> u32 {
        let Self {
            st,
            long,
            learn_buffer,
            stamp_counter,
            ..
        } = self;
        let sc = *stamp_counter;
        let mut count = 0;
        for &l in reason.lits(long) {
            let v = l.var();
            let vlvl = st.data[v].level;
            if vlvl >= level {
                if st.stamps[v] >= sc {
                    continue;
                }
                count += 1;
                st.stamps[v] = sc;
            } else {
                if vlvl <= 0 {
                    continue;
                }
                if st.stamps[v] < sc {
                    // a level touched a second time is marked with sc + 1
                    let li = &mut st.levels[vlvl as usize];
                    li.stamp = if li.stamp < sc { sc } else { sc + 1 };
                    learn_buffer.push(l);
                    st.stamps[v] = sc;
                }
            }
        }
        count
    }

    /// Derive the first-UIP conflict clause into the learn buffer.
    ///
    /// Resolves backwards along the trail until a single stamped literal
    /// remains on the conflicting level, then appends that literal's
    /// negation and strengthens the clause.
    fn compute_conflict_clause(&mut self) {
        self.increase_stamp();
        let level = self.st.current_level();
        let confl = self.conflict_reason;
        let mut on_current_level = self.stamp_and_count(level, confl);
        let mut idx = self.st.trail.len() - 1;
        while on_current_level > 1 {
            let l = self.st.trail[idx];
            if self.st.stamps[l.var()] >= self.stamp_counter {
                let r = self.st.reasons[idx];
                on_current_level += self.stamp_and_count(level, r);
                on_current_level -= 1;
            }
            idx -= 1;
        }
        while self.st.stamps[self.st.trail[idx].var()] < self.stamp_counter {
            idx -= 1;
        }
        let uip = self.st.trail[idx];
        self.learn_buffer.push(!uip);
        debug!("conflict clause before minimization: {:?}", self.learn_buffer);
        self.filter_redundancies();
    }

    /// Strengthen the learnt clause: drop every literal whose level was
    /// touched more than once and whose reason chain bottoms out in other
    /// stamped literals (or level 0). The asserting literal moves to the
    /// front.
    fn filter_redundancies(&mut self) {
        let n = self.learn_buffer.len();
        self.learn_buffer.swap(0, n - 1);
        let mut buf = mem::take(&mut self.learn_buffer);
        let sc = self.stamp_counter;
        let mut j = 1;
        for i in 1..buf.len() {
            let l = buf[i];
            let vlvl = self.st.level(l.var());
            let redundant = vlvl == 0
                || (self.st.levels[vlvl as usize].stamp == sc + 1 && self.lit_redundant(l.var()));
            if !redundant {
                buf[j] = l;
                j += 1;
            }
        }
        buf.truncate(j);
        self.learn_buffer = buf;
    }

    /// Check whether stamped literal `v` is implied by the rest of the
    /// clause through its reason ancestry.
    ///
    /// Walks the reason graph with an explicit stack. Results are memoized
    /// in the stamp map: `generation + 1` marks proven-redundant variables,
    /// `generation + 2` proven-required ones.
    fn lit_redundant(&mut self, v: Var) -> bool {
        let sc = self.stamp_counter;
        let s = self.st.stamps[v];
        if s == sc + 1 {
            return true;
        }
        if s == sc + 2 {
            return false;
        }
        self.minimize_stack.clear();
        self.minimize_stack.push((v, 0));
        let Self {
            st,
            long,
            minimize_stack,
            ..
        } = self;
        'dfs: while let Some(&(v, k0)) = minimize_stack.last() {
            let reason = st.reasons[st.data[v].trail_pos as usize];
            if reason.is_decision() {
                st.stamps[v] = sc + 2;
                return false;
            }
            let lits = reason.lits(long);
            let mut k = k0;
            while k < lits.len() {
                let rl = lits[k];
                k += 1;
                let rv = rl.var();
                if rv == v {
                    continue;
                }
                let rlvl = st.data[rv].level;
                if rlvl == 0 {
                    continue;
                }
                let rs = st.stamps[rv];
                if rs == sc + 2 {
                    return false;
                }
                if rs >= sc {
                    // in the clause, or already proven redundant
                    continue;
                }
                if st.levels[rlvl as usize].stamp < sc {
                    // untouched level: no chance to resolve this one away
                    st.stamps[rv] = sc + 2;
                    return false;
                }
                let top = minimize_stack.len() - 1;
                minimize_stack[top].1 = k;
                minimize_stack.push((rv, 0));
                continue 'dfs;
            }
            st.stamps[v] = sc + 1;
            minimize_stack.pop();
        }
        true
    }

    /// Backjump target: the maximum level among the non-asserting literals
    /// of the learnt clause, together with a literal of that level.
    fn target_level(&self) -> (i32, Lit) {
        let mut target_level = 0;
        let mut target_lit = self.learn_buffer[0];
        for &l in &self.learn_buffer[1..] {
            let lvl = self.st.level(l.var());
            if lvl > target_level {
                target_level = lvl;
                target_lit = l;
            }
        }
        (target_level, target_lit)
    }

    /// Undo the conflicting level silently, then every further level above
    /// the target with reporting.
    fn jumpback_to_target<H: AssignmentHandler>(&mut self, handler: &mut H) -> (i32, Lit) {
        let (target_level, target_lit) = self.target_level();
        self.rollback_level(handler, false);
        while self.st.levels.len() > (target_level + 1) as usize {
            self.rollback_level(handler, true);
        }
        self.qhead = self.st.trail.len();
        (target_level, target_lit)
    }

    /// File the learnt clause into the store matching its size.
    fn insert_conflict_clause(&mut self) -> CRef {
        match self.learn_buffer.len() {
            1 => {
                self.unary.push(self.learn_buffer[0]);
                CRef::UNDEF
            }
            2 => {
                let (l1, l2) = (self.learn_buffer[0], self.learn_buffer[1]);
                self.binary[l1].push(l2);
                self.binary[l2].push(l1);
                CRef::UNDEF
            }
            _ => self.long.push(&self.learn_buffer),
        }
    }

    /// Watch a freshly learnt long clause on its asserting literal and the
    /// backjump-level literal.
    fn attach_learnt_watchers(&mut self, learnt: Lit, target_lit: Lit, cref: CRef) {
        debug_assert_ne!(cref, CRef::UNDEF);
        let lits = self.long.lits_mut(cref);
        debug_assert_eq!(lits[0], learnt);
        let pos = 1 + lits[1..]
            .iter()
            .position(|&l| l == target_lit)
            .expect("backjump literal is in the learnt clause");
        lits.swap(1, pos);
        self.watches[learnt].push(Watcher {
            blocker: target_lit,
            cref,
        });
        self.watches[target_lit].push(Watcher {
            blocker: learnt,
            cref,
        });
    }

    /// Insert the learnt clause, backjump, and assert its first literal at
    /// the target level.
    fn apply_conflict_clause<H: AssignmentHandler>(&mut self, handler: &mut H) {
        let cref = self.insert_conflict_clause();
        let (target_level, target_lit) = self.jumpback_to_target(handler);
        let learnt = self.learn_buffer[0];
        let len = self.learn_buffer.len();
        debug!("learnt clause {:?}", self.learn_buffer);
        debug!("backjump to level {}", target_level);
        match len {
            1 => self.st.assign(learnt, target_level, Reason::Unary(learnt)),
            2 => self.st.assign(
                learnt,
                target_level,
                Reason::Binary([learnt, self.learn_buffer[1]]),
            ),
            _ => {
                self.st.assign(
                    learnt,
                    target_level,
                    Reason::Long {
                        len: len as u32,
                        cref,
                    },
                );
                self.attach_learnt_watchers(learnt, target_lit, cref);
            }
        }
        self.learn_buffer.clear();
    }

    // -------- REASON-GRAPH QUERIES --------

    /// The decisions that (transitively) forced `l`, as `(level, decision)`
    /// pairs.
    ///
    /// Panics if the propagator is conflicting or `l` is open. The slice is
    /// valid until the next call into the propagator.
    pub fn decisions_leading_to(&mut self, l: Lit) -> &[(i32, Lit)] {
        if self.conflicting {
            panic!("decisions_leading_to called on a conflicting propagator");
        }
        if self.st.is_open(l) {
            panic!("decisions_leading_to called with an open literal");
        }
        self.decision_buffer.clear();
        let reason = self.st.reasons[self.st.trail_pos(l.var())];
        if reason.is_decision() {
            self.decision_buffer.push((self.st.level(l.var()), l));
            return &self.decision_buffer;
        }
        let current = self.increase_stamp();
        {
            let Self {
                st,
                long,
                learn_buffer,
                ..
            } = self;
            for &lr in reason.lits(long) {
                if lr != l {
                    st.stamps[lr.var()] = current;
                    learn_buffer.push(!lr);
                }
            }
        }
        self.bfs_reasons(current);
        self.learn_buffer.clear();
        &self.decision_buffer
    }

    /// The decisions that (transitively) led to the current conflict.
    ///
    /// Panics if the propagator is not conflicting.
    pub fn decisions_leading_to_conflict(&mut self) -> &[(i32, Lit)] {
        if !self.conflicting {
            panic!("decisions_leading_to_conflict called on a non-conflicting propagator");
        }
        debug_assert_ne!(self.conflict_lit, Lit::UNDEF);
        self.decision_buffer.clear();
        let current = self.increase_stamp();
        {
            let Self {
                st,
                long,
                learn_buffer,
                conflict_reason,
                conflict_lit,
                ..
            } = self;
            for &lr in conflict_reason.lits(long) {
                if lr != *conflict_lit {
                    st.stamps[lr.var()] = current;
                    learn_buffer.push(!lr);
                }
            }
            st.stamps[conflict_lit.var()] = current;
            let lc = !*conflict_lit;
            let reason = st.reasons[st.data[lc.var()].trail_pos as usize];
            for &lr in reason.lits(long) {
                if st.stamps[lr.var()] != current {
                    st.stamps[lr.var()] = current;
                    learn_buffer.push(!lr);
                }
            }
        }
        self.bfs_reasons(current);
        self.learn_buffer.clear();
        &self.decision_buffer
    }

    /// Breadth-first walk over the reason graph seeded by the learn buffer;
    /// collects every decision into the decision buffer. Each variable is
    /// visited at most once per stamp generation.
    fn bfs_reasons(&mut self, current: u32) {
        let Self {
            st,
            long,
            learn_buffer,
            decision_buffer,
            ..
        } = self;
        let mut pos = 0;
        while pos < learn_buffer.len() {
            let next = learn_buffer[pos];
            pos += 1;
            let tindex = st.data[next.var()].trail_pos as usize;
            let reason = st.reasons[tindex];
            if reason.is_decision() {
                decision_buffer.push((st.data[next.var()].level, next));
            } else {
                for &lr in reason.lits(long) {
                    if lr != next {
                        let v = lr.var();
                        if st.stamps[v] != current {
                            st.stamps[v] = current;
                            learn_buffer.push(!lr);
                        }
                    }
                }
            }
        }
    }

    // -------- CONSTRUCTION HELPERS --------

    fn init_watches(&mut self) {
        self.init_unaries();
        if self.conflicting {
            return;
        }
        if self.num_vars > 0 {
            self.watches
                .reserve_default(Lit::from_idx(2 * self.num_vars - 1));
        }
        let mut cref = self.long.first();
        while cref < self.long.end() {
            self.install_long_clause(cref);
            if self.conflicting {
                return;
            }
            cref = self.long.next(cref);
        }
        self.init_binary_watches();
    }

    fn init_unaries(&mut self) {
        for i in 0..self.unary.len() {
            let l = self.unary[i];
            if !self.st.assign_at_0(l) {
                self.conflicting = true;
                return;
            }
        }
    }

    /// Classify a long clause at construction time: drop it when satisfied
    /// at level 0, record a conflict when falsified, force when unit, and
    /// otherwise move two open literals to the front and watch them.
    fn install_long_clause(&mut self, cref: CRef) {
        let Self {
            long,
            st,
            watches,
            unary,
            conflicting,
            conflict_reason,
            ..
        } = self;
        let lits = long.lits_mut(cref);
        let mut open_pos = [0usize; 2];
        let mut nws: i32 = 0;
        for (k, &l) in lits.iter().enumerate() {
            let val = st.value_lit(l);
            if val == lbool::UNDEF {
                if nws < 2 {
                    open_pos[nws as usize] = k;
                    nws += 1;
                }
            } else if val == lbool::TRUE {
                nws = -1;
                break;
            }
        }
        match nws {
            // satisfied at level 0 - ignored, not watched
            -1 => {}
            // violated at level 0 - conflict, UNSAT
            0 => {
                *conflicting = true;
                *conflict_reason = Reason::Long {
                    len: lits.len() as u32,
                    cref,
                };
            }
            // forcing at level 0 - add as unary, do not watch
            1 => {
                let forced_true = lits[open_pos[0]];
                unary.push(forced_true);
                if !st.assign_at_0(forced_true) {
                    *conflicting = true;
                }
            }
            _ => {
                lits.swap(0, open_pos[0]);
                lits.swap(1, open_pos[1]);
                let (w1, w2) = (lits[0], lits[1]);
                watches[w1].push(Watcher {
                    blocker: w2,
                    cref,
                });
                watches[w2].push(Watcher {
                    blocker: w1,
                    cref,
                });
            }
        }
    }

    /// Force the partners of every literal already false at level 0.
    fn init_binary_watches(&mut self) {
        let Self {
            num_vars,
            binary,
            st,
            unary,
            conflicting,
            ..
        } = self;
        for idx in 0..2 * *num_vars {
            let l = Lit::from_idx(idx);
            if st.is_false(l) {
                for &partner in &binary[l] {
                    unary.push(partner);
                    if !st.assign_at_0(partner) {
                        *conflicting = true;
                        return;
                    }
                }
            }
        }
    }
}
