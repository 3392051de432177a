//! Loading formula definitions from TOML.
//!
//! ```toml
//! [base]
//! "unit|base|str" = 0
//!
//! [[define]]
//! name  = "unit|total|str"
//! about = "Total strength."
//! expr  = "unit|base|str + unit|class|str"
//!
//! [cost]
//! names = ["unit|total|spcost"]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use statline_engine::EngineError;
use statline_engine::engine::{FormulaStore, VarName};

use crate::error::{CoreError, Result};
use crate::sheet::Sheet;

const MAX_DEFINITIONS_FILE_BYTES: u64 = 1_048_576; // 1 MiB

/// Parsed contents of a definitions file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Definitions {
    /// Base variable name -> default value.
    #[serde(default)]
    pub base: BTreeMap<String, f64>,
    #[serde(default)]
    pub define: Vec<Definition>,
    #[serde(default)]
    pub cost: Option<CostTable>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Definition {
    pub name: String,
    pub expr: String,
    #[serde(default)]
    pub about: Option<String>,
}

/// Variables displayed with the cost floor.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostTable {
    pub names: Vec<String>,
}

impl Definitions {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a definitions file, refusing files over 1 MiB.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        if size > MAX_DEFINITIONS_FILE_BYTES {
            return Err(CoreError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                max: MAX_DEFINITIONS_FILE_BYTES,
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Cost-style variable names, checked against the definitions.
    pub fn cost_names(&self) -> Result<BTreeSet<VarName>> {
        let mut names = BTreeSet::new();
        for raw in self.cost.iter().flat_map(|table| &table.names) {
            let name = VarName::new(raw.as_str())?;
            let declared = self.base.contains_key(raw) || self.define.iter().any(|d| &d.name == raw);
            if !declared {
                return Err(EngineError::UnknownVariable(raw.clone()).into());
            }
            names.insert(name);
        }
        Ok(names)
    }

    /// Build and validate the formula store.
    pub fn into_store(self) -> Result<FormulaStore> {
        let mut builder = FormulaStore::builder();
        for (name, default) in self.base {
            builder = builder.base(name, default);
        }
        for definition in self.define {
            builder = match definition.about {
                Some(about) => builder.define_with_about(definition.name, definition.expr, about),
                None => builder.define(definition.name, definition.expr),
            };
        }
        Ok(builder.build()?)
    }

    /// Build the store and a sheet over it, with cost floors applied.
    pub fn into_sheet(self) -> Result<Sheet> {
        let cost = self.cost_names()?;
        let store = self.into_store()?;
        Ok(Sheet::new(store).with_cost_variables(cost))
    }
}
