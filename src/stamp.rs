use crate::intmap::AsIndex;
use std::marker::PhantomData;

/// A set over a fixed universe of index-like values, implemented with
/// per-value generation stamps.
///
/// Membership means "the value's stamp equals the current generation", so
/// [`clear`](StampSet::clear) is a generation bump and all operations are
/// amortized O(1). When the generation counter wraps around, the whole
/// backing array is reset once.
#[derive(Debug, Clone)]
pub struct StampSet<K: AsIndex> {
    stamps: Vec<u32>,
    current: u32,
    _marker: PhantomData<fn(K)>,
}

impl<K: AsIndex> StampSet<K> {
    pub fn with_universe(universe_size: usize) -> Self {
        Self {
            stamps: vec![0; universe_size],
            current: 1,
            _marker: PhantomData,
        }
    }

    pub fn universe_size(&self) -> usize {
        self.stamps.len()
    }

    /// Empty the set by moving to a fresh generation.
    pub fn clear(&mut self) {
        self.current = self.current.wrapping_add(1);
        if self.current == 0 {
            for s in self.stamps.iter_mut() {
                *s = 0;
            }
            self.current = 1;
        }
    }

    /// Clear, then insert every element of `values`.
    pub fn assign<I: IntoIterator<Item = K>>(&mut self, values: I) {
        self.clear();
        for v in values {
            self.insert(v);
        }
    }

    #[inline]
    pub fn insert(&mut self, v: K) {
        self.stamps[v.as_index()] = self.current;
    }

    #[inline]
    pub fn erase(&mut self, v: K) {
        self.stamps[v.as_index()] = 0;
    }

    /// Insert `v`; returns whether it was absent before.
    #[inline]
    pub fn check_insert(&mut self, v: K) -> bool {
        let s = &mut self.stamps[v.as_index()];
        let absent = *s != self.current;
        *s = self.current;
        absent
    }

    /// Erase `v`; returns whether it was present before.
    #[inline]
    pub fn check_erase(&mut self, v: K) -> bool {
        let s = &mut self.stamps[v.as_index()];
        let present = *s == self.current;
        *s = 0;
        present
    }

    #[inline]
    pub fn contains(&self, v: K) -> bool {
        self.stamps[v.as_index()] == self.current
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clause::Lit;

    #[test]
    fn test_insert_clear_contains() {
        let mut s: StampSet<Lit> = StampSet::with_universe(8);
        assert_eq!(s.universe_size(), 8);
        let l = |i: u32| Lit::from_idx(i);
        assert!(!s.contains(l(3)));
        s.insert(l(3));
        s.insert(l(7));
        assert!(s.contains(l(3)));
        assert!(s.contains(l(7)));
        assert!(!s.contains(l(0)));
        s.clear();
        assert!(!s.contains(l(3)));
        assert!(!s.contains(l(7)));
    }

    #[test]
    fn test_check_insert_and_erase() {
        let mut s: StampSet<Lit> = StampSet::with_universe(4);
        let l = |i: u32| Lit::from_idx(i);
        assert!(s.check_insert(l(2)));
        assert!(!s.check_insert(l(2)));
        assert!(s.check_erase(l(2)));
        assert!(!s.check_erase(l(2)));
        assert!(!s.contains(l(2)));
        s.assign(vec![l(0), l(1)]);
        assert!(s.contains(l(0)));
        assert!(s.contains(l(1)));
        assert!(!s.contains(l(2)));
    }

    #[test]
    fn test_generation_wraparound() {
        let mut s: StampSet<Lit> = StampSet::with_universe(4);
        let l = |i: u32| Lit::from_idx(i);
        s.insert(l(1));
        // force the next clear to wrap the generation counter
        s.current = u32::MAX;
        s.clear();
        assert_eq!(s.current, 1);
        assert!(!s.contains(l(1)));
        s.insert(l(2));
        assert!(s.contains(l(2)));
        s.clear();
        assert!(!s.contains(l(2)));
    }
}
