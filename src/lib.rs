/*****************************************************************************************[lib.rs]
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

//! An externally-driven CDCL propagation core.
//!
//! This crate implements the algorithmic heart of a conflict-driven
//! clause-learning SAT solver as an interactive data structure: two-watched
//! literal unit propagation over a trail with decision levels, first-UIP
//! conflict analysis with redundancy minimization, clause learning, and
//! non-chronological backjumping. It makes no decisions of its own — the
//! caller pushes decision literals and reacts to conflicts.
//!
//! On top of the [`Propagator`] the crate provides a [`ModelBuilder`] for
//! assembling formulas, a reduced-formula extractor ([`ReducedFormula`])
//! that turns a non-conflicting partial assignment into a renumbered
//! residual CNF, and a syntactic subsumption eliminator
//! ([`eliminate_subsumed`]).
//!
//! Branching heuristics, restarts, clause-database reduction, file I/O and
//! proof logging are intentionally out of scope.

//======== LOG ============

// stubs when logging is not enabled
#[cfg(not(feature = "logging"))]
#[macro_use]
pub(crate) mod log {
    macro_rules! trace {
        ($( $x:expr ),*) => {};
    }
    macro_rules! debug {
        ($( $x:expr ),*) => {};
    }
}

#[cfg(feature = "logging")]
#[macro_use]
pub extern crate log;

//======== PUBLIC INTERFACE ============

pub mod builder;
pub mod callbacks;
pub mod clause;
pub mod core;
pub mod extract;
pub mod intmap;
pub mod stamp;
pub mod subsume;

pub use crate::{
    builder::ModelBuilder,
    callbacks::{AssignmentHandler, EventLog},
    clause::{lbool, CRef, LMap, Lit, LongClauses, Reason, VMap, Var},
    core::Propagator,
    extract::{ReducedFormula, FIXED_FALSE, FIXED_TRUE},
    stamp::StampSet,
    subsume::eliminate_subsumed,
};

/// Domain outcomes that surface to the caller as values.
///
/// Misuse of the API (popping level 0, deciding an assigned literal,
/// querying the reason graph in the wrong state) is a programmer bug and
/// panics instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A clause with no literals was finalized; the formula is trivially
    /// unsatisfiable.
    #[error("empty clause added, formula is trivially unsatisfiable")]
    EmptyClause,
    /// A conflict was reached at decision level 0.
    #[error("conflict at decision level 0, formula is unsatisfiable")]
    Unsat,
}
