//! Concrete species and reactions produced by network generation
use indexmap::IndexMap;

use crate::model::complex::Complex;

/// A connected, fully specified complex in canonical form
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Species {
    pub complex: Complex,
    /// Rendering of the canonical form, unique per species
    pub signature: String,
}

/// A concrete reaction between species, identified by position in the species list
#[derive(Clone, Debug, PartialEq)]
pub struct Reaction {
    /// Name of the rule that produced the reaction
    pub rule: String,
    /// Whether the reaction comes from the reverse direction of a reversible rule
    pub reverse: bool,
    /// Reactant species indices, sorted, one entry per copy
    pub reactants: Vec<usize>,
    /// Product species indices, sorted, one entry per copy
    pub products: Vec<usize>,
    /// Name of the rate parameter, expression or observable
    pub rate: String,
    /// Statistical factor multiplying the rate
    pub factor: f64,
}

impl Reaction {
    /// Net change of each species per unit of flux, species without a net change are left out
    pub fn stoichiometry(&self) -> IndexMap<usize, f64> {
        let mut net: IndexMap<usize, f64> = IndexMap::new();
        for &r in &self.reactants {
            *net.entry(r).or_insert(0.0) -= 1.0;
        }
        for &p in &self.products {
            *net.entry(p).or_insert(0.0) += 1.0;
        }
        net.retain(|_, v| *v != 0.0);
        net
    }

    /// Reactant species with their multiplicity
    pub fn reactant_orders(&self) -> IndexMap<usize, u32> {
        let mut orders = IndexMap::new();
        for &r in &self.reactants {
            *orders.entry(r).or_insert(0) += 1;
        }
        orders
    }
}

/// Species and reactions of a closed network
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReactionNetwork {
    /// In first-discovered order, this order defines the state vector
    pub species: Vec<Species>,
    pub reactions: Vec<Reaction>,
}

impl ReactionNetwork {
    /// Position of `complex` (in canonical form) in the species list
    pub fn species_index(&self, complex: &Complex) -> Option<usize> {
        self.species.iter().position(|s| &s.complex == complex)
    }

    /// Position of the species with the given canonical signature
    pub fn find_species(&self, signature: &str) -> Option<usize> {
        self.species.iter().position(|s| s.signature == signature)
    }

    /// Human readable form of reaction `index`, e.g. `A(b) + B(a) -> A(b!1).B(a!1)`
    pub fn describe_reaction(&self, index: usize) -> Option<String> {
        let reaction = self.reactions.get(index)?;
        let side = |indices: &[usize]| {
            if indices.is_empty() {
                "0".to_string()
            } else {
                indices
                    .iter()
                    .map(|&i| self.species[i].signature.as_str())
                    .collect::<Vec<&str>>()
                    .join(" + ")
            }
        };
        Some(format!(
            "{} -> {}",
            side(reaction.reactants.as_slice()),
            side(reaction.products.as_slice())
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalytic_template_has_no_net_change() {
        let translation = Reaction {
            rule: "A20_translation".to_string(),
            reverse: false,
            reactants: vec![3],
            products: vec![3, 7],
            rate: "c4".to_string(),
            factor: 1.0,
        };
        let net = translation.stoichiometry();
        assert_eq!(net.len(), 1);
        assert_eq!(net[&7], 1.0);

        let dimerization = Reaction {
            rule: "dimerize".to_string(),
            reverse: false,
            reactants: vec![0, 0],
            products: vec![1],
            rate: "k".to_string(),
            factor: 0.5,
        };
        assert_eq!(dimerization.stoichiometry()[&0], -2.0);
        assert_eq!(dimerization.reactant_orders()[&0], 2);
    }
}
