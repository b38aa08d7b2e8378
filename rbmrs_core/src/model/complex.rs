//! Index based molecular graphs
//!
//! A [`Complex`] is an arena of molecule instances. Every instance carries one slot per site of
//! its molecule type, and bonds are stored on both endpoints as `(molecule, site)` indices, so
//! binding cycles never turn into ownership cycles. The same type is used for fully specified
//! species and for partial patterns; patterns simply leave states unset and use the
//! [`Bond::Wildcard`] and [`Bond::Bound`] conditions.
use std::collections::VecDeque;

use thiserror::Error;

use super::molecule::MoleculeType;

/// Bond value of a site slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bond {
    /// Unconstrained (patterns only)
    Wildcard,
    /// Unbound
    Free,
    /// Bound to an unspecified partner (patterns only)
    Bound,
    /// Bound to `(molecule, site)` within the same complex
    To(usize, usize),
}

/// State and bond of one site on one molecule instance
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SiteSlot {
    /// Index into the site's state domain, `None` for stateless sites or wildcards
    pub state: Option<usize>,
    pub bond: Bond,
}

impl SiteSlot {
    /// Slot that places no condition on the site
    pub fn wildcard() -> Self {
        SiteSlot {
            state: None,
            bond: Bond::Wildcard,
        }
    }
}

/// A molecule instance
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Molecule {
    /// Index of the molecule type in the model
    pub molecule_type: usize,
    /// One slot per site, in the molecule type's site order
    pub sites: Vec<SiteSlot>,
}

impl Molecule {
    /// Instance with every site unconstrained
    pub fn wildcard(molecule_type: usize, site_count: usize) -> Self {
        Molecule {
            molecule_type,
            sites: vec![SiteSlot::wildcard(); site_count],
        }
    }
}

/// A graph of molecule instances joined by bonds
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Complex {
    pub molecules: Vec<Molecule>,
}

impl Complex {
    pub fn new(molecules: Vec<Molecule>) -> Self {
        Complex { molecules }
    }

    /// Number of molecule instances (atoms, for conservation checks)
    pub fn size(&self) -> usize {
        self.molecules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.molecules.is_empty()
    }

    /// Check bond symmetry: every `To` edge must be mirrored by its partner
    pub fn check_bonds(&self) -> Result<(), ComplexError> {
        for (m, molecule) in self.molecules.iter().enumerate() {
            for (s, slot) in molecule.sites.iter().enumerate() {
                if let Bond::To(pm, ps) = slot.bond {
                    if (pm, ps) == (m, s) {
                        return Err(ComplexError::SelfBond { molecule: m, site: s });
                    }
                    let mirrored = self
                        .molecules
                        .get(pm)
                        .and_then(|p| p.sites.get(ps))
                        .map(|p| p.bond == Bond::To(m, s))
                        .unwrap_or(false);
                    if !mirrored {
                        return Err(ComplexError::AsymmetricBond { molecule: m, site: s });
                    }
                }
            }
        }
        Ok(())
    }

    /// Whether every site has a concrete bond and every stateful site a concrete state
    pub fn is_fully_specified(&self, types: &[MoleculeType]) -> bool {
        self.molecules.iter().all(|molecule| {
            let mtype = &types[molecule.molecule_type];
            molecule.sites.len() == mtype.sites.len()
                && molecule.sites.iter().zip(&mtype.sites).all(|(slot, site)| {
                    matches!(slot.bond, Bond::Free | Bond::To(..))
                        && (slot.state.is_some() == site.has_states())
                })
        })
    }

    /// Connected components as lists of molecule indices
    ///
    /// Components are ordered by their smallest molecule index and each list is sorted, so the
    /// result only depends on the arena order.
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let mut seen = vec![false; self.molecules.len()];
        let mut components = Vec::new();
        for start in 0..self.molecules.len() {
            if seen[start] {
                continue;
            }
            seen[start] = true;
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(m) = queue.pop_front() {
                for slot in &self.molecules[m].sites {
                    if let Bond::To(pm, _) = slot.bond {
                        if !seen[pm] {
                            seen[pm] = true;
                            component.push(pm);
                            queue.push_back(pm);
                        }
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    pub fn is_connected(&self) -> bool {
        self.connected_components().len() <= 1
    }

    /// Extract the molecules at `indices` (in that order) as a new complex
    ///
    /// Bonds to molecules outside `indices` become [`Bond::Free`].
    pub fn subcomplex(&self, indices: &[usize]) -> Complex {
        let mut position = vec![None; self.molecules.len()];
        for (new, &old) in indices.iter().enumerate() {
            position[old] = Some(new);
        }
        let molecules = indices
            .iter()
            .map(|&old| {
                let molecule = &self.molecules[old];
                Molecule {
                    molecule_type: molecule.molecule_type,
                    sites: molecule
                        .sites
                        .iter()
                        .map(|slot| SiteSlot {
                            state: slot.state,
                            bond: match slot.bond {
                                Bond::To(pm, ps) => match position[pm] {
                                    Some(np) => Bond::To(np, ps),
                                    None => Bond::Free,
                                },
                                other => other,
                            },
                        })
                        .collect(),
                }
            })
            .collect();
        Complex { molecules }
    }

    /// Disjoint union, returning the combined complex and the offset of each part
    pub fn disjoint_union<'a, I>(parts: I) -> (Complex, Vec<usize>)
    where
        I: IntoIterator<Item = &'a Complex>,
    {
        let mut molecules = Vec::new();
        let mut offsets = Vec::new();
        for part in parts {
            let offset = molecules.len();
            offsets.push(offset);
            molecules.extend(part.molecules.iter().map(|molecule| Molecule {
                molecule_type: molecule.molecule_type,
                sites: molecule
                    .sites
                    .iter()
                    .map(|slot| SiteSlot {
                        state: slot.state,
                        bond: match slot.bond {
                            Bond::To(pm, ps) => Bond::To(pm + offset, ps),
                            other => other,
                        },
                    })
                    .collect(),
            }));
        }
        (Complex { molecules }, offsets)
    }

    /// Render in BNGL style, numbering bonds in order of first appearance
    pub fn render(&self, types: &[MoleculeType]) -> String {
        let mut labels: std::collections::HashMap<(usize, usize), usize> =
            std::collections::HashMap::new();
        let mut next_label = 1;
        let mut out = String::new();
        for (m, molecule) in self.molecules.iter().enumerate() {
            if m > 0 {
                out.push('.');
            }
            let mtype = &types[molecule.molecule_type];
            out.push_str(&mtype.name);
            out.push('(');
            let mut first = true;
            for (s, slot) in molecule.sites.iter().enumerate() {
                if slot.state.is_none() && slot.bond == Bond::Wildcard {
                    continue;
                }
                if !first {
                    out.push(',');
                }
                first = false;
                let site = &mtype.sites[s];
                out.push_str(&site.name);
                if let Some(state) = slot.state {
                    out.push_str(&format!("~{}", site.states[state]));
                }
                match slot.bond {
                    Bond::Free => {}
                    Bond::Bound => out.push_str("!+"),
                    Bond::Wildcard => out.push_str("!?"),
                    Bond::To(pm, ps) => {
                        let label = match labels.get(&(pm, ps)) {
                            Some(label) => *label,
                            None => {
                                let label = next_label;
                                next_label += 1;
                                labels.insert((m, s), label);
                                label
                            }
                        };
                        out.push_str(&format!("!{}", label));
                    }
                }
            }
            out.push(')');
        }
        out
    }
}

/// Structural errors in a complex
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComplexError {
    #[error("Bond on molecule {molecule} site {site} is not mirrored by its partner")]
    AsymmetricBond { molecule: usize, site: usize },
    #[error("Site {site} of molecule {molecule} is bound to itself")]
    SelfBond { molecule: usize, site: usize },
}
