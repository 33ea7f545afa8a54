//! Subsumption elimination and reduced-formula extraction, including a
//! randomized validation suite.

use propsat::{eliminate_subsumed, Lit, ModelBuilder, Propagator, ReducedFormula};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn lit(i: u32) -> Lit {
    Lit::from_idx(i)
}

/// Same instance family as in `waerden.rs`; here only used as a clause
/// generator for the extractor.
fn waerden33(n: u32) -> ModelBuilder {
    let mut builder = ModelBuilder::new();
    let mut vars = vec![Lit::UNDEF];
    for _ in 1..=n {
        vars.push(builder.add_variable());
    }
    let mut d = 1;
    while 2 * d <= n - 1 {
        for i in 1..=(n - 2 * d) {
            let (a, b, c) = (
                vars[i as usize],
                vars[(i + d) as usize],
                vars[(i + 2 * d) as usize],
            );
            builder.add_clause(&[a, b, c]).unwrap();
            builder.add_clause(&[!a, !b, !c]).unwrap();
        }
        d += 1;
    }
    builder
}

#[test]
fn subsumption_corner_cases() {
    let mut clauses: Vec<Vec<Lit>> = vec![
        vec![lit(0)],
        vec![lit(2)],
        vec![lit(2)],
        vec![lit(2), lit(4)],
        vec![lit(2), lit(5)],
        vec![lit(0)],
        vec![lit(0), lit(3)],
        vec![lit(3), lit(6)],
        vec![lit(1), lit(3), lit(5)],
    ];
    eliminate_subsumed(&mut clauses, 4);
    assert_eq!(clauses.len(), 4);
    let expected: [&[Lit]; 4] = [
        &[lit(0)],
        &[lit(2)],
        &[lit(3), lit(6)],
        &[lit(1), lit(3), lit(5)],
    ];
    for want in expected.iter() {
        assert_eq!(
            clauses.iter().filter(|c| c.as_slice() == *want).count(),
            1,
            "expected exactly one copy of {:?}",
            want
        );
    }
}

#[test]
fn extractor_is_identity_without_assignments() {
    let model = waerden33(9);
    let p = Propagator::from_builder(&model);
    assert!(p.trail().is_empty());

    let mut red = ReducedFormula::new();
    red.extract(&p);
    assert!(red.clauses().iter().all(|c| c.len() == 3));
    assert_eq!(red.num_vars(), 9);
    assert!(p.all_literals().all(|l| red.to_new(l) == l));
    assert!(p.all_literals().all(|l| red.to_old(l) == l));
    assert_eq!(red.num_clauses(), 32);

    // already subsumption-free
    let mut clauses = red.clauses().to_vec();
    eliminate_subsumed(&mut clauses, 9);
    assert_eq!(clauses.len(), 32);
}

fn sorted(clause: &[Lit]) -> Vec<Lit> {
    let mut s = clause.to_vec();
    s.sort_unstable();
    s
}

fn is_subset(a: &[Lit], b: &[Lit]) -> bool {
    a.iter().all(|l| b.contains(l))
}

fn validate_subsumed(original: &[Vec<Lit>], eliminated: &[Vec<Lit>]) {
    assert!(eliminated.len() <= original.len());

    // no duplicate survivors
    let mut seen: Vec<Vec<Lit>> = Vec::new();
    for c in eliminated {
        let s = sorted(c);
        assert!(!seen.contains(&s), "duplicate survivor {:?}", s);
        seen.push(s);
    }

    // every survivor appears in the input
    for c in eliminated {
        assert!(original.contains(c), "survivor {:?} not in input", c);
    }

    // every input clause contains some survivor
    let elim_sorted: Vec<Vec<Lit>> = eliminated.iter().map(|c| sorted(c)).collect();
    for c in original {
        let cs = sorted(c);
        assert!(
            elim_sorted.iter().any(|e| is_subset(e, &cs)),
            "input clause {:?} has no subset among survivors",
            c
        );
    }

    // no survivor is a strict superset of another survivor
    for (i, a) in elim_sorted.iter().enumerate() {
        for (j, b) in elim_sorted.iter().enumerate() {
            if i != j {
                assert!(
                    !is_subset(b, a),
                    "survivor {:?} is a superset of survivor {:?}",
                    a,
                    b
                );
            }
        }
    }
}

#[test]
fn randomized_subsumption_preserves_coverage() {
    let mut rng = SmallRng::seed_from_u64(0x77AE_2D3B);
    for _ in 0..1000 {
        let num_vars: u32 = rng.gen_range(10..=20);
        let mut clauses: Vec<Vec<Lit>> = Vec::new();
        for _ in 0..30 {
            let len = rng.gen_range(1..=15.min(num_vars));
            let mut var_used = vec![false; num_vars as usize];
            let mut clause = Vec::new();
            for _ in 0..len {
                let l = rng.gen_range(0..2 * num_vars);
                let v = (l / 2) as usize;
                if var_used[v] {
                    continue;
                }
                var_used[v] = true;
                clause.push(lit(l));
            }
            clauses.push(clause);
        }
        let original = clauses.clone();
        eliminate_subsumed(&mut clauses, num_vars);
        validate_subsumed(&original, &clauses);
    }
}
