use std::fmt;

use serde::Serialize;

use super::value::PropertyRef;

/// A named expression variable bound to a host property.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Binding {
    pub name: String,
    pub source: PropertyRef,
}

/// A fully resolved per-frame update: `target ← expression(bindings)`.
///
/// When `use_self` is set the expression may read committed values of the
/// target owner's properties through `self.*` paths.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Rule {
    pub target: PropertyRef,
    pub expression: String,
    pub bindings: Vec<Binding>,
    pub use_self: bool,
}

impl Rule {
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.target, self.expression)?;
        if !self.bindings.is_empty() {
            let vars: Vec<String> = self
                .bindings
                .iter()
                .map(|b| format!("{}={}", b.name, b.source))
                .collect();
            write!(f, "  [{}]", vars.join(", "))?;
        }
        if self.use_self {
            write!(f, "  (self)")?;
        }
        Ok(())
    }
}
