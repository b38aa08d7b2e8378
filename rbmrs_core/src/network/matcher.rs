//! Sub-graph matching of patterns against complexes
//!
//! One matcher serves rule application, observables and symmetry counting. Components of the
//! pattern are rooted at every free target molecule in turn and then grown along pattern bonds,
//! so the search only ever branches at component roots.
use crate::model::complex::{Bond, Complex, SiteSlot};

/// How pattern constraints are compared with the target
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchMode {
    /// Wildcard semantics: unset states and [`Bond::Wildcard`] match anything, and
    /// [`Bond::Bound`] matches any bond
    Pattern,
    /// Every constraint must be identical, used to map a pattern onto itself
    Exact,
}

/// Target molecule index for each pattern molecule
pub type Embedding = Vec<usize>;

#[derive(Clone, Copy, Debug)]
enum Step {
    /// Try every unused target molecule
    Root(usize),
    /// Follow the bond on `parent_site` of the already placed `parent`
    Follow {
        molecule: usize,
        parent: usize,
        parent_site: usize,
    },
}

fn plan(pattern: &Complex) -> Vec<Step> {
    let mut steps = Vec::with_capacity(pattern.molecules.len());
    for component in pattern.connected_components() {
        let root = component[0];
        let mut placed = vec![root];
        steps.push(Step::Root(root));
        let mut head = 0;
        while head < placed.len() {
            let m = placed[head];
            head += 1;
            for (s, slot) in pattern.molecules[m].sites.iter().enumerate() {
                if let Bond::To(pm, _) = slot.bond {
                    if !placed.contains(&pm) {
                        placed.push(pm);
                        steps.push(Step::Follow {
                            molecule: pm,
                            parent: m,
                            parent_site: s,
                        });
                    }
                }
            }
        }
    }
    steps
}

struct Search<'a> {
    pattern: &'a Complex,
    target: &'a Complex,
    mode: MatchMode,
    steps: Vec<Step>,
    map: Vec<usize>,
    used: Vec<bool>,
    found: Vec<Embedding>,
}

impl Search<'_> {
    fn slot_matches(&self, p: &SiteSlot, t: &SiteSlot, pm: usize, tm: usize) -> bool {
        let state_ok = match self.mode {
            MatchMode::Pattern => p.state.is_none() || p.state == t.state,
            MatchMode::Exact => p.state == t.state,
        };
        if !state_ok {
            return false;
        }
        match (self.mode, p.bond, t.bond) {
            (MatchMode::Pattern, Bond::Wildcard, _) => true,
            (MatchMode::Pattern, Bond::Bound, Bond::To(..) | Bond::Bound) => true,
            (_, Bond::To(qm, qs), Bond::To(um, us)) => {
                if qs != us {
                    return false;
                }
                let image = if qm == pm { tm } else { self.map[qm] };
                image == usize::MAX || image == um
            }
            (_, pb, tb) => pb == tb && !matches!(pb, Bond::To(..)),
        }
    }

    fn compatible(&self, pm: usize, tm: usize) -> bool {
        if self.used[tm] {
            return false;
        }
        let p = &self.pattern.molecules[pm];
        let t = &self.target.molecules[tm];
        p.molecule_type == t.molecule_type
            && p.sites.len() == t.sites.len()
            && p
                .sites
                .iter()
                .zip(&t.sites)
                .all(|(ps, ts)| self.slot_matches(ps, ts, pm, tm))
    }

    fn place(&mut self, step: usize, pm: usize, tm: usize) {
        if !self.compatible(pm, tm) {
            return;
        }
        self.map[pm] = tm;
        self.used[tm] = true;
        self.extend(step + 1);
        self.map[pm] = usize::MAX;
        self.used[tm] = false;
    }

    fn extend(&mut self, step: usize) {
        if step == self.steps.len() {
            self.found.push(self.map.clone());
            return;
        }
        match self.steps[step] {
            Step::Root(pm) => {
                for tm in 0..self.target.molecules.len() {
                    self.place(step, pm, tm);
                }
            }
            Step::Follow {
                molecule,
                parent,
                parent_site,
            } => {
                let tp = self.map[parent];
                if let Bond::To(tm, _) = self.target.molecules[tp].sites[parent_site].bond {
                    self.place(step, molecule, tm);
                }
            }
        }
    }
}

/// Every injective map of `pattern` molecules into `target` molecules that respects the
/// pattern's types, states and bonds
pub fn embeddings(pattern: &Complex, target: &Complex, mode: MatchMode) -> Vec<Embedding> {
    let mut search = Search {
        pattern,
        target,
        mode,
        steps: plan(pattern),
        map: vec![usize::MAX; pattern.molecules.len()],
        used: vec![false; target.molecules.len()],
        found: Vec::new(),
    };
    search.extend(0);
    search.found
}

/// Number of ways `pattern` maps onto itself, at least 1
pub fn automorphisms(pattern: &Complex) -> usize {
    embeddings(pattern, pattern, MatchMode::Exact).len().max(1)
}

/// Embeddings of `pattern` into `target` divided by the pattern's automorphisms
///
/// This is the number of distinct occurrences of the pattern, and the same symmetry convention
/// the network generator uses for reaction factors.
pub fn match_count(pattern: &Complex, target: &Complex) -> f64 {
    embeddings(pattern, target, MatchMode::Pattern).len() as f64 / automorphisms(pattern) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::complex::tests::{dimer, types};
    use crate::model::complex::Molecule;
    use crate::model::molecule::{MoleculeType, Site};
    use crate::model::model::resolve_pattern;

    fn pattern(text: &str) -> Complex {
        resolve_pattern(&types(), &text.parse().unwrap()).unwrap()
    }

    fn free_a() -> Complex {
        Complex::new(vec![Molecule {
            molecule_type: 0,
            sites: vec![
                SiteSlot {
                    state: None,
                    bond: Bond::Free,
                },
                SiteSlot {
                    state: Some(1),
                    bond: Bond::Free,
                },
            ],
        }])
    }

    #[test]
    fn bond_conditions() {
        assert_eq!(embeddings(&pattern("A(b)"), &dimer(), MatchMode::Pattern).len(), 0);
        assert_eq!(embeddings(&pattern("A(b)"), &free_a(), MatchMode::Pattern).len(), 1);
        assert_eq!(embeddings(&pattern("A(b!+)"), &dimer(), MatchMode::Pattern).len(), 1);
        assert_eq!(embeddings(&pattern("A(b!?)"), &free_a(), MatchMode::Pattern).len(), 1);
        assert_eq!(embeddings(&pattern("A()"), &dimer(), MatchMode::Pattern), vec![vec![0]]);
    }

    #[test]
    fn states_and_explicit_bonds() {
        assert_eq!(embeddings(&pattern("A(t~u)"), &dimer(), MatchMode::Pattern).len(), 1);
        assert_eq!(embeddings(&pattern("A(t~p)"), &dimer(), MatchMode::Pattern).len(), 0);
        let bound = pattern("B(a!1).A(b!1)");
        assert_eq!(embeddings(&bound, &dimer(), MatchMode::Pattern), vec![vec![1, 0]]);
        assert_eq!(automorphisms(&bound), 1);
    }

    #[test]
    fn symmetric_patterns() {
        let types = vec![MoleculeType::new("X", vec![Site::new("s")])];
        let homodimer = resolve_pattern(&types, &"X(s!1).X(s!1)".parse().unwrap()).unwrap();
        assert_eq!(automorphisms(&homodimer), 2);
        assert_eq!(embeddings(&homodimer, &homodimer, MatchMode::Pattern).len(), 2);
        assert_eq!(match_count(&homodimer, &homodimer), 1.0);

        let single = resolve_pattern(&types, &"X()".parse().unwrap()).unwrap();
        assert_eq!(match_count(&single, &homodimer), 2.0);

        // Two unbonded molecules in the same complex, unordered
        let pair = resolve_pattern(&types, &"X().X()".parse().unwrap()).unwrap();
        assert_eq!(automorphisms(&pair), 2);
        assert_eq!(match_count(&pair, &homodimer), 1.0);
    }

    #[test]
    fn exact_mode_distinguishes_wildcards() {
        let wildcard = pattern("A(b!?)");
        let free = pattern("A(b)");
        assert_eq!(embeddings(&wildcard, &free, MatchMode::Exact).len(), 0);
        assert_eq!(embeddings(&wildcard, &free, MatchMode::Pattern).len(), 1);
        assert_eq!(automorphisms(&wildcard), 1);
    }
}
