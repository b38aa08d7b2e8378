//! One direction of a rule, ready to be applied to matched species
use crate::model::complex::{Bond, Complex, Molecule, SiteSlot};
use crate::model::model::ModelDefinitionError;
use crate::model::molecule::MoleculeType;
use crate::model::rule::CompiledRule;
use crate::network::matcher::{automorphisms, Embedding};

/// A rule read in one direction, with its reactant to product molecule correspondence
#[derive(Clone, Debug)]
pub struct DirectedRule {
    /// Index of the rule in the model
    pub rule: usize,
    pub reverse: bool,
    pub name: String,
    pub reactants: Vec<Complex>,
    pub rate: String,
    /// Automorphisms of the whole reactant side
    pub symmetry: usize,
    reactant_offsets: Vec<usize>,
    products: Complex,
    /// Product molecule for each reactant molecule (reactant side flattened)
    mapping: Vec<Option<usize>>,
    /// Product molecules created by the rule
    synthesized: Vec<usize>,
    /// Reactant complexes none of whose molecules survive, their whole species is removed
    consumed: Vec<bool>,
}

impl DirectedRule {
    /// Read `rule` forwards, or backwards when `reverse` is set
    ///
    /// Reactant molecules are paired with the first unused product molecule of the same type,
    /// in order of appearance.
    pub fn compile(
        index: usize,
        rule: &CompiledRule,
        reverse: bool,
        molecule_types: &[MoleculeType],
    ) -> Result<DirectedRule, ModelDefinitionError> {
        let (reactants, products, rate) = if reverse {
            let rate = rule.reverse_rate.clone().ok_or_else(|| ModelDefinitionError::InvalidRule {
                rule: rule.name.clone(),
                reason: "rule is not reversible".to_string(),
            })?;
            (&rule.products, &rule.reactants, rate)
        } else {
            (&rule.reactants, &rule.products, rule.rate.clone())
        };
        let (reactant_union, reactant_offsets) = Complex::disjoint_union(reactants);
        let (product_union, _) = Complex::disjoint_union(products);

        let mut taken = vec![false; product_union.molecules.len()];
        let mapping: Vec<Option<usize>> = reactant_union
            .molecules
            .iter()
            .map(|molecule| {
                let found = product_union
                    .molecules
                    .iter()
                    .enumerate()
                    .position(|(p, product)| {
                        !taken[p] && product.molecule_type == molecule.molecule_type
                    });
                if let Some(p) = found {
                    taken[p] = true;
                }
                found
            })
            .collect();
        let synthesized: Vec<usize> = (0..product_union.molecules.len())
            .filter(|p| !taken[*p])
            .collect();
        for &p in &synthesized {
            let molecule = &product_union.molecules[p];
            if molecule.sites.iter().any(|slot| slot.bond == Bond::Bound) {
                return Err(ModelDefinitionError::InvalidRule {
                    rule: rule.name.clone(),
                    reason: format!(
                        "new {} molecule cannot be bound to an unspecified partner",
                        molecule_types[molecule.molecule_type].name
                    ),
                });
            }
        }
        let consumed = reactants
            .iter()
            .enumerate()
            .map(|(i, complex)| {
                let start = reactant_offsets[i];
                (start..start + complex.molecules.len()).all(|r| mapping[r].is_none())
            })
            .collect();

        Ok(DirectedRule {
            rule: index,
            reverse,
            name: rule.name.clone(),
            symmetry: automorphisms(&reactant_union),
            reactants: reactants.clone(),
            rate,
            reactant_offsets,
            products: product_union,
            mapping,
            synthesized,
            consumed,
        })
    }

    pub fn arity(&self) -> usize {
        self.reactants.len()
    }

    /// Apply the rule to `species` (one per reactant pattern) at the given embeddings and
    /// return the product species in canonical form
    ///
    /// Returns `None` when the match cannot be transformed, i.e. a new bond would land on a
    /// site that stays bound elsewhere.
    pub fn apply(
        &self,
        species: &[&Complex],
        embeddings: &[&Embedding],
        molecule_types: &[MoleculeType],
    ) -> Option<Vec<Complex>> {
        let (mut work, offsets) = Complex::disjoint_union(species.iter().copied());

        let mut image = vec![0; self.mapping.len()];
        for (i, embedding) in embeddings.iter().enumerate() {
            for (j, &t) in embedding.iter().enumerate() {
                image[self.reactant_offsets[i] + j] = offsets[i] + t;
            }
        }

        let mut deleted = vec![false; work.molecules.len()];
        for (i, consumed) in self.consumed.iter().enumerate() {
            if *consumed {
                let start = offsets[i];
                deleted[start..start + species[i].molecules.len()].fill(true);
            }
        }
        let mut product_image = vec![usize::MAX; self.products.molecules.len()];
        for (r, target) in self.mapping.iter().enumerate() {
            match target {
                Some(p) => product_image[*p] = image[r],
                None => deleted[image[r]] = true,
            }
        }

        for &p in &self.synthesized {
            let product = &self.products.molecules[p];
            let molecule_type = &molecule_types[product.molecule_type];
            product_image[p] = work.molecules.len();
            work.molecules.push(Molecule {
                molecule_type: product.molecule_type,
                sites: molecule_type
                    .sites
                    .iter()
                    .zip(&product.sites)
                    .map(|(site, slot)| SiteSlot {
                        state: site.has_states().then(|| slot.state.unwrap_or(0)),
                        bond: Bond::Free,
                    })
                    .collect(),
            });
            deleted.push(false);
        }

        for m in 0..deleted.len() {
            if deleted[m] {
                for s in 0..work.molecules[m].sites.len() {
                    break_bond(&mut work, m, s);
                }
            }
        }

        // State changes and bonds the products no longer have
        for (p, product) in self.products.molecules.iter().enumerate() {
            let t = product_image[p];
            for (s, slot) in product.sites.iter().enumerate() {
                if let Some(state) = slot.state {
                    work.molecules[t].sites[s].state = Some(state);
                }
                match slot.bond {
                    Bond::Free => break_bond(&mut work, t, s),
                    Bond::To(pp, ps) => {
                        if work.molecules[t].sites[s].bond != Bond::To(product_image[pp], ps) {
                            break_bond(&mut work, t, s);
                        }
                    }
                    Bond::Wildcard | Bond::Bound => {}
                }
            }
        }

        // New bonds
        for (p, product) in self.products.molecules.iter().enumerate() {
            let t = product_image[p];
            for (s, slot) in product.sites.iter().enumerate() {
                if let Bond::To(pp, ps) = slot.bond {
                    let u = product_image[pp];
                    match (work.molecules[t].sites[s].bond, work.molecules[u].sites[ps].bond) {
                        (Bond::To(a, b), _) if (a, b) == (u, ps) => {}
                        (Bond::Free, Bond::Free) => {
                            work.molecules[t].sites[s].bond = Bond::To(u, ps);
                            work.molecules[u].sites[ps].bond = Bond::To(t, s);
                        }
                        _ => return None,
                    }
                }
            }
        }

        let survivors: Vec<usize> = (0..deleted.len()).filter(|m| !deleted[*m]).collect();
        let result = work.subcomplex(&survivors);
        Some(
            result
                .connected_components()
                .iter()
                .map(|component| result.subcomplex(component).canonicalize())
                .collect(),
        )
    }
}

/// Free `(molecule, site)` and its partner
fn break_bond(complex: &mut Complex, molecule: usize, site: usize) {
    if let Bond::To(pm, ps) = complex.molecules[molecule].sites[site].bond {
        complex.molecules[pm].sites[ps].bond = Bond::Free;
        complex.molecules[molecule].sites[site].bond = Bond::Free;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::complex::tests::{dimer, types};
    use crate::model::model::resolve_pattern;
    use crate::model::molecule::Site;
    use crate::model::pattern::ComplexPattern;
    use crate::model::rule::Rule;
    use crate::network::matcher::{embeddings, MatchMode};

    fn compile(types: &[MoleculeType], text: &str, reverse: bool) -> DirectedRule {
        let rule = Rule::parse("r", text).unwrap();
        let resolve = |side: &[ComplexPattern]| {
            side.iter()
                .map(|p| resolve_pattern(types, p).unwrap())
                .collect::<Vec<_>>()
        };
        let compiled = CompiledRule {
            name: rule.name.clone(),
            reactants: resolve(rule.reactants.as_slice()),
            products: resolve(rule.products.as_slice()),
            rate: rule.rate.clone(),
            reverse_rate: rule.reverse_rate.clone(),
        };
        DirectedRule::compile(0, &compiled, reverse, types).unwrap()
    }

    fn species(types: &[MoleculeType], text: &str) -> Complex {
        resolve_pattern(types, &text.parse().unwrap())
            .unwrap()
            .canonicalize()
    }

    fn apply_first(rule: &DirectedRule, inputs: &[&Complex], types: &[MoleculeType]) -> Vec<Complex> {
        let found: Vec<Embedding> = rule
            .reactants
            .iter()
            .zip(inputs)
            .map(|(pattern, target)| embeddings(pattern, target, MatchMode::Pattern).remove(0))
            .collect();
        let refs: Vec<&Embedding> = found.iter().collect();
        rule.apply(inputs, &refs, types).unwrap()
    }

    #[test]
    fn binding_and_unbinding() {
        let types = types();
        let bind = compile(&types, "A(b) + B(a) <-> A(b!1).B(a!1), kf, kr", false);
        assert_eq!(bind.arity(), 2);
        assert_eq!(bind.symmetry, 1);
        let a = species(&types, "A(b,t~u)");
        let b = species(&types, "B(a)");
        let products = apply_first(&bind, &[&a, &b], &types);
        assert_eq!(products, vec![dimer().canonicalize()]);

        let unbind = compile(&types, "A(b) + B(a) <-> A(b!1).B(a!1), kf, kr", true);
        assert_eq!(unbind.rate, "kr");
        let products = apply_first(&unbind, &[&dimer()], &types);
        assert_eq!(products, vec![a, b]);
    }

    #[test]
    fn state_change_keeps_unmentioned_context() {
        let types = types();
        let phos = compile(&types, "A(t~u) -> A(t~p), k", false);
        let products = apply_first(&phos, &[&dimer()], &types);
        assert_eq!(products[0].render(&types), "A(b!1,t~p).B(a!1)");
    }

    #[test]
    fn degradation_and_synthesis() {
        let types = types();
        let degrade = compile(&types, "A() -> 0, k", false);
        assert!(apply_first(&degrade, &[&dimer()], &types).is_empty());

        // B dropped from the dimer, A keeps a free site
        let cleave = compile(&types, "A(b!1).B(a!1) -> A(b), k", false);
        let products = apply_first(&cleave, &[&dimer()], &types);
        assert_eq!(products, vec![species(&types, "A(b,t~u)")]);

        let synth = compile(&types, "0 -> A(t~p), k", false);
        assert_eq!(synth.arity(), 0);
        let products = synth.apply(&[], &[], &types).unwrap();
        assert_eq!(products, vec![species(&types, "A(b,t~p)")]);

        // Catalysis keeps the template and adds a new molecule with default states
        let translate = compile(&types, "B() -> B() + A(), k", false);
        let b = species(&types, "B(a)");
        let products = apply_first(&translate, &[&b], &types);
        assert_eq!(products, vec![b, species(&types, "A(b,t~u)")]);
    }

    #[test]
    fn homodimer_symmetry() {
        let types = vec![MoleculeType::new("X", vec![Site::new("s")])];
        let dimerize = compile(&types, "X(s) + X(s) -> X(s!1).X(s!1), k", false);
        assert_eq!(dimerize.symmetry, 2);
        let x = species(&types, "X(s)");
        let products = apply_first(&dimerize, &[&x, &x], &types);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].render(&types), "X(s!1).X(s!1)");
    }

    #[test]
    fn new_bond_replaces_old_partner() {
        let types = types();
        // Reactant pattern leaves the bond unconstrained and the A in the dimer is already bound
        let bind = compile(&types, "A(t~u) + B(a) -> A(b!1,t~u).B(a!1), k", false);
        let b = species(&types, "B(a)");
        let emb_a = embeddings(&bind.reactants[0], &dimer(), MatchMode::Pattern).remove(0);
        let emb_b = embeddings(&bind.reactants[1], &b, MatchMode::Pattern).remove(0);
        let products = bind.apply(&[&dimer(), &b], &[&emb_a, &emb_b], &types).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0], dimer().canonicalize());
        assert_eq!(products[1], b);
    }
}
