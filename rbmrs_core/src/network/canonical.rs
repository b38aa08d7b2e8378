//! Canonical forms of complexes
//!
//! Sites are ordered and hold at most one bond, so a breadth-first traversal from a fixed root
//! molecule visits the graph in exactly one way. Encoding that traversal gives a key per root,
//! and the smallest key over all roots identifies the complex up to isomorphism. Relabeling the
//! molecules in the order of the winning traversal gives the canonical form, so two complexes are
//! the same species exactly when their canonical forms compare equal.
use crate::model::complex::{Bond, Complex};
use crate::model::molecule::MoleculeType;

/// Visit order and key of the traversal rooted at `root`
fn traverse(complex: &Complex, root: usize) -> (Vec<usize>, Vec<usize>) {
    let mut rank = vec![usize::MAX; complex.molecules.len()];
    rank[root] = 0;
    let mut order = vec![root];
    let mut key = Vec::new();
    let mut head = 0;
    while head < order.len() {
        let m = order[head];
        head += 1;
        let molecule = &complex.molecules[m];
        for slot in &molecule.sites {
            if let Bond::To(pm, _) = slot.bond {
                if rank[pm] == usize::MAX {
                    rank[pm] = order.len();
                    order.push(pm);
                }
            }
        }
        key.push(molecule.molecule_type);
        key.push(molecule.sites.len());
        for slot in &molecule.sites {
            key.push(slot.state.map(|s| s + 1).unwrap_or(0));
            match slot.bond {
                Bond::Wildcard => key.push(0),
                Bond::Free => key.push(1),
                Bond::Bound => key.push(2),
                Bond::To(pm, ps) => {
                    key.push(3);
                    key.push(rank[pm]);
                    key.push(ps);
                }
            }
        }
    }
    (order, key)
}

/// Best traversal of the connected component holding `members`
fn best_traversal(complex: &Complex, members: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut best: Option<(Vec<usize>, Vec<usize>)> = None;
    for &root in members {
        let candidate = traverse(complex, root);
        best = match best {
            Some(current) if current.1 <= candidate.1 => Some(current),
            _ => Some(candidate),
        };
    }
    best.unwrap_or_default()
}

impl Complex {
    /// Canonical relabeling of the molecules
    ///
    /// Components of a disconnected complex are canonicalized separately and ordered by key.
    pub fn canonicalize(&self) -> Complex {
        let mut parts: Vec<(Vec<usize>, Vec<usize>)> = self
            .connected_components()
            .iter()
            .map(|members| best_traversal(self, members))
            .collect();
        parts.sort_by(|a, b| a.1.cmp(&b.1));
        let order: Vec<usize> = parts.into_iter().flat_map(|(order, _)| order).collect();
        self.subcomplex(&order)
    }

    /// BNGL style rendering of the canonical form, e.g. `A(s!1).B(a!1)`
    pub fn signature(&self, molecule_types: &[MoleculeType]) -> String {
        self.canonicalize().render(molecule_types)
    }
}
