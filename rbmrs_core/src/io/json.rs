//! Module providing JSON IO for models and generated networks
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::model::{Model, ModelBuilder, ModelDefinitionError, Quantity};
use crate::network::reaction::ReactionNetwork;

// region JSON Model
/// A model as a JSON document, declarations use the textual syntax
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonModel {
    /// e.g. `"IkBa(nfkb,phos~u~p,loc~n~c)"`
    pub molecule_types: Vec<String>,
    #[serde(default)]
    pub parameters: IndexMap<String, f64>,
    /// Expression name to expression text
    #[serde(default)]
    pub expressions: IndexMap<String, String>,
    /// Observable name to a `+` separated list of patterns
    #[serde(default)]
    pub observables: IndexMap<String, String>,
    #[serde(default)]
    pub rules: Vec<JsonRule>,
    #[serde(default)]
    pub initials: Vec<JsonInitial>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRule {
    pub name: String,
    /// e.g. `"A(b) + B(a) <-> A(b!1).B(a!1), kf, kr"`
    pub rule: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonInitial {
    pub pattern: String,
    /// A number, a list of numbers, or a parameter name
    pub quantity: Quantity,
}

impl JsonModel {
    /// Parse every declaration into a builder, nothing is checked until it is frozen
    pub fn to_builder(&self) -> Result<ModelBuilder, JsonError> {
        let mut builder = ModelBuilder::new();
        for molecule_type in &self.molecule_types {
            builder.molecule_type(molecule_type)?;
        }
        for (name, value) in &self.parameters {
            builder.parameter(name, *value);
        }
        for (name, text) in &self.expressions {
            builder.expression(name, text)?;
        }
        for (name, text) in &self.observables {
            builder.observable(name, text)?;
        }
        for rule in &self.rules {
            builder.rule(&rule.name, &rule.rule)?;
        }
        for initial in &self.initials {
            builder.initial(&initial.pattern, initial.quantity.clone())?;
        }
        Ok(builder)
    }
}

impl Model {
    /// Read and freeze a model from a JSON string
    pub fn from_json_str(json: &str) -> Result<Model, JsonError> {
        let json_model: JsonModel = serde_json::from_str(json)?;
        Ok(json_model.to_builder()?.freeze()?)
    }
}
// endregion JSON Model

// region JSON Network
/// A generated network as a JSON document, species are referenced by signature
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonNetwork {
    pub species: Vec<String>,
    pub reactions: Vec<JsonReaction>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonReaction {
    pub rule: String,
    pub reverse: bool,
    pub reactants: Vec<String>,
    pub products: Vec<String>,
    /// Net change per species, species without net change are left out
    pub stoichiometry: IndexMap<String, f64>,
    pub rate: String,
    pub factor: f64,
}

impl From<&ReactionNetwork> for JsonNetwork {
    fn from(network: &ReactionNetwork) -> Self {
        let signature = |i: usize| network.species[i].signature.clone();
        JsonNetwork {
            species: network.species.iter().map(|s| s.signature.clone()).collect(),
            reactions: network
                .reactions
                .iter()
                .map(|r| JsonReaction {
                    rule: r.rule.clone(),
                    reverse: r.reverse,
                    reactants: r.reactants.iter().map(|&i| signature(i)).collect(),
                    products: r.products.iter().map(|&i| signature(i)).collect(),
                    stoichiometry: r
                        .stoichiometry()
                        .into_iter()
                        .map(|(i, c)| (signature(i), c))
                        .collect(),
                    rate: r.rate.clone(),
                    factor: r.factor,
                })
                .collect(),
        }
    }
}

impl ReactionNetwork {
    /// Serialize the species and reactions to a pretty printed JSON string
    pub fn to_json_string(&self) -> Result<String, JsonError> {
        Ok(serde_json::to_string_pretty(&JsonNetwork::from(self))?)
    }
}
// endregion JSON Network

#[derive(Error, Debug)]
pub enum JsonError {
    #[error("Serde json parse error: {0}")]
    SerdeJsonParseError(#[from] serde_json::Error),
    #[error("Invalid model declaration: {0}")]
    Model(#[from] ModelDefinitionError),
}
