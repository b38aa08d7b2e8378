//! Breadth-first closure of the species reachable from the seed species
//!
//! Each round applies every directed rule to every ordered tuple of known species in which at
//! least one member was discovered in the previous round, so each tuple is examined exactly once
//! over the whole run. Species are numbered in the order they are first discovered.
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

use crate::configuration::NetworkConfiguration;
use crate::model::complex::Complex;
use crate::model::model::Model;
use crate::model::molecule::MoleculeType;
use crate::network::matcher::{embeddings, Embedding, MatchMode};
use crate::network::reaction::{Reaction, ReactionNetwork, Species};
use crate::network::transform::DirectedRule;
use crate::network::NetworkError;

/// Known species that match one reactant pattern, with every embedding into each
type SlotMatches = Vec<(usize, Vec<Embedding>)>;

/// (directed rule, sorted reactants, sorted products)
type ReactionKey = (usize, Vec<usize>, Vec<usize>);

/// Reactant species and product complexes of one rule application
type Outcome = (Vec<usize>, Vec<Complex>);

/// Expands the rules of a [`Model`] into a [`ReactionNetwork`]
pub struct NetworkGenerator<'a> {
    model: &'a Model,
    configuration: NetworkConfiguration,
}

impl<'a> NetworkGenerator<'a> {
    pub fn new(model: &'a Model, configuration: NetworkConfiguration) -> Self {
        NetworkGenerator {
            model,
            configuration,
        }
    }

    /// Generate the network reachable from the model's initial species
    pub fn generate(&self) -> Result<ReactionNetwork, NetworkError> {
        let seeds: Vec<Complex> = self
            .model
            .initials()
            .iter()
            .map(|initial| initial.species.clone())
            .collect();
        self.generate_from(&seeds)
    }

    /// Generate the network reachable from an arbitrary set of species
    ///
    /// Seeds are deduplicated and keep their order at the start of the species list. Running
    /// this on the species of a closed network discovers nothing new.
    pub fn generate_from(&self, seeds: &[Complex]) -> Result<ReactionNetwork, NetworkError> {
        self.configuration.validate()?;
        let types = self.model.molecule_types();

        let mut rules = Vec::new();
        for (i, rule) in self.model.rules().iter().enumerate() {
            rules.push(DirectedRule::compile(i, rule, false, types)?);
            if rule.reverse_rate.is_some() {
                rules.push(DirectedRule::compile(i, rule, true, types)?);
            }
        }

        let mut species: IndexSet<Complex> = IndexSet::new();
        for seed in seeds {
            check_seed(seed, types)?;
            self.insert(&mut species, seed.canonicalize(), 0)?;
        }

        let mut matches: Vec<Vec<SlotMatches>> = rules
            .iter()
            .map(|rule| vec![Vec::new(); rule.arity()])
            .collect();
        let mut reactions: IndexMap<ReactionKey, f64> = IndexMap::new();
        let mut frontier = 0;
        let mut round = 0;
        while frontier < species.len() || round == 0 {
            if let Some(limit) = self.configuration.max_iterations {
                if round >= limit {
                    return Err(NetworkError::IterationLimit {
                        limit,
                        species: species.len(),
                    });
                }
            }
            round += 1;
            let known = species.len();

            for (r, rule) in rules.iter().enumerate() {
                for (slot, pattern) in rule.reactants.iter().enumerate() {
                    for index in frontier..known {
                        let found = embeddings(pattern, &species[index], MatchMode::Pattern);
                        if !found.is_empty() {
                            matches[r][slot].push((index, found));
                        }
                    }
                }
            }

            for (r, rule) in rules.iter().enumerate() {
                let outcomes = if rule.arity() == 0 {
                    // Zero order rules do not depend on species, they fire once
                    if round == 1 {
                        rule.apply(&[], &[], types)
                            .map(|products| vec![(Vec::new(), products)])
                            .unwrap_or_default()
                    } else {
                        Vec::new()
                    }
                } else {
                    fire(rule, &matches[r], &species, frontier, types)
                };
                let weight = 1.0 / rule.symmetry as f64;
                for (reactants, products) in outcomes {
                    let mut product_indices = Vec::with_capacity(products.len());
                    for product in products {
                        product_indices.push(self.insert(&mut species, product, round)?);
                    }
                    product_indices.sort_unstable();
                    *reactions
                        .entry((r, reactants, product_indices))
                        .or_insert(0.0) += weight;
                }
            }

            debug!(
                round,
                new_species = species.len() - known,
                species = species.len(),
                reactions = reactions.len(),
                "network generation round"
            );
            frontier = known;
        }

        let network = ReactionNetwork {
            species: species
                .into_iter()
                .map(|complex| Species {
                    signature: complex.render(types),
                    complex,
                })
                .collect(),
            reactions: reactions
                .into_iter()
                .map(|((r, reactants, products), factor)| Reaction {
                    rule: rules[r].name.clone(),
                    reverse: rules[r].reverse,
                    reactants,
                    products,
                    rate: rules[r].rate.clone(),
                    factor,
                })
                .collect(),
        };
        info!(
            species = network.species.len(),
            reactions = network.reactions.len(),
            rounds = round,
            "generated reaction network"
        );
        Ok(network)
    }

    /// Index of `complex`, adding it if it is new
    fn insert(
        &self,
        species: &mut IndexSet<Complex>,
        complex: Complex,
        round: usize,
    ) -> Result<usize, NetworkError> {
        if let Some(index) = species.get_index_of(&complex) {
            return Ok(index);
        }
        if species.len() >= self.configuration.max_species {
            return Err(NetworkError::NetworkTooLarge {
                limit: self.configuration.max_species,
                round,
            });
        }
        Ok(species.insert_full(complex).0)
    }
}

fn check_seed(seed: &Complex, types: &[MoleculeType]) -> Result<(), NetworkError> {
    if seed
        .molecules
        .iter()
        .any(|m| m.molecule_type >= types.len())
    {
        return Err(NetworkError::InvalidSpecies(format!(
            "{:?} uses an unknown molecule type",
            seed
        )));
    }
    if seed.is_empty()
        || seed.check_bonds().is_err()
        || !seed.is_fully_specified(types)
        || !seed.is_connected()
    {
        return Err(NetworkError::InvalidSpecies(seed.render(types)));
    }
    Ok(())
}

/// Apply `rule` to every tuple of matching species that involves the frontier
fn fire(
    rule: &DirectedRule,
    slots: &[SlotMatches],
    species: &IndexSet<Complex>,
    frontier: usize,
    types: &[MoleculeType],
) -> Vec<Outcome> {
    let mut outcomes = Vec::new();
    if slots.iter().any(|slot| slot.is_empty()) {
        return outcomes;
    }
    let lengths: Vec<usize> = slots.iter().map(|slot| slot.len()).collect();
    let mut pick = vec![0; slots.len()];
    loop {
        let chosen: Vec<&(usize, Vec<Embedding>)> = pick
            .iter()
            .zip(slots)
            .map(|(&k, slot)| &slot[k])
            .collect();
        if chosen.iter().any(|(index, _)| *index >= frontier) {
            let inputs: Vec<&Complex> = chosen.iter().map(|(index, _)| &species[*index]).collect();
            let mut reactants: Vec<usize> = chosen.iter().map(|(index, _)| *index).collect();
            reactants.sort_unstable();
            let counts: Vec<usize> = chosen.iter().map(|(_, found)| found.len()).collect();
            let mut which = vec![0; counts.len()];
            loop {
                let picked: Vec<&Embedding> = chosen
                    .iter()
                    .zip(&which)
                    .map(|((_, found), &w)| &found[w])
                    .collect();
                if let Some(products) = rule.apply(&inputs, &picked, types) {
                    outcomes.push((reactants.clone(), products));
                }
                if !advance(&mut which, &counts) {
                    break;
                }
            }
        }
        if !advance(&mut pick, &lengths) {
            break;
        }
    }
    outcomes
}

/// Step a mixed radix counter, false once it wraps around
fn advance(counter: &mut [usize], lengths: &[usize]) -> bool {
    for k in (0..counter.len()).rev() {
        counter[k] += 1;
        if counter[k] < lengths[k] {
            return true;
        }
        counter[k] = 0;
    }
    false
}
