//! Rule construction and emission.
//!
//! Templates use `{name}` placeholders. A placeholder resolves either to a bound
//! variable (the name stays in the expression and becomes a binding) or to a
//! literal substituted in place (numbers, self-access paths). Every placeholder
//! must resolve and every declared variable or literal must be used.

use std::collections::HashSet;

use log::debug;

use crate::backend::{Backend, ExpressionId, Namespace};
use crate::error::CompileError;
use crate::model::entity::{MechanismEntity, PropertyOwner};
use crate::model::rule::{Binding, Rule};
use crate::model::value::{PropertyRef, ScalarSpec, ScalarValue, ValueRef};

/// Names the host already defines in every expression.
const RESERVED_NAMES: &[&str] = &["frame", "self", "if", "floor", "round"];

#[derive(Clone, Debug)]
enum Substitution {
    Variable(PropertyRef),
    Literal(String),
    /// Bound but never read; only orders evaluation.
    Dependency(PropertyRef),
}

#[derive(Clone, Debug)]
pub struct RuleBuilder {
    target: PropertyRef,
    template: String,
    substitutions: Vec<(String, Substitution)>,
    use_self: bool,
}

impl RuleBuilder {
    pub fn new(target: &impl ValueRef, template: &str) -> Self {
        Self {
            target: target.property(),
            template: template.to_string(),
            substitutions: Vec::new(),
            use_self: false,
        }
    }

    pub fn var(mut self, name: &str, value: &impl ValueRef) -> Self {
        self.substitutions
            .push((name.to_string(), Substitution::Variable(value.property())));
        self
    }

    pub fn depends_on(mut self, name: &str, value: &impl ValueRef) -> Self {
        self.substitutions
            .push((name.to_string(), Substitution::Dependency(value.property())));
        self
    }

    pub fn literal(mut self, name: &str, text: impl Into<String>) -> Self {
        self.substitutions
            .push((name.to_string(), Substitution::Literal(text.into())));
        self
    }

    pub fn number(self, name: &str, value: f64) -> Self {
        self.literal(name, format_number(value))
    }

    /// Substitutes the self-access path of `value`. Implies `use_self`.
    pub fn self_value(self, name: &str, value: &impl ValueRef) -> Self {
        self.literal(name, value.self_path()).use_self()
    }

    pub fn use_self(mut self) -> Self {
        self.use_self = true;
        self
    }

    pub fn build(self) -> Result<Rule, CompileError> {
        let mut seen = HashSet::new();
        for (name, substitution) in &self.substitutions {
            if !seen.insert(name.as_str()) {
                return Err(CompileError::invalid(format!(
                    "placeholder '{}' declared twice for {}",
                    name, self.target
                )));
            }
            if matches!(substitution, Substitution::Variable(_) | Substitution::Dependency(_))
                && !is_binding_name(name)
            {
                return Err(CompileError::invalid(format!(
                    "'{}' is not a valid variable name",
                    name
                )));
            }
        }

        let mut expression = String::with_capacity(self.template.len());
        let mut used = HashSet::new();
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            expression.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| {
                CompileError::invalid(format!("unterminated placeholder in '{}'", self.template))
            })?;
            let name = &after[..close];
            match self.substitution(name) {
                Some(Substitution::Variable(_)) => expression.push_str(name),
                Some(Substitution::Literal(text)) => expression.push_str(text),
                Some(Substitution::Dependency(_)) | None => {
                    return Err(CompileError::invalid(format!(
                        "unknown placeholder '{{{}}}' in expression for {}",
                        name, self.target
                    )));
                }
            }
            used.insert(name.to_string());
            rest = &after[close + 1..];
        }
        expression.push_str(rest);

        let mut bindings = Vec::new();
        for (name, substitution) in self.substitutions {
            match substitution {
                Substitution::Dependency(source) => bindings.push(Binding { name, source }),
                _ if !used.contains(&name) => {
                    return Err(CompileError::invalid(format!(
                        "placeholder '{}' is not used in expression for {}",
                        name, self.target
                    )));
                }
                Substitution::Variable(source) => bindings.push(Binding { name, source }),
                Substitution::Literal(_) => {}
            }
        }

        Ok(Rule {
            target: self.target,
            expression,
            bindings,
            use_self: self.use_self,
        })
    }

    fn substitution(&self, name: &str) -> Option<&Substitution> {
        self.substitutions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }
}

/// Longest literal written with full shortest-roundtrip precision. Longer ones
/// (tiny magnitudes print every leading zero) are cut to
/// [`LITERAL_DECIMALS`] decimal places.
const MAX_LITERAL_LEN: usize = 24;
const LITERAL_DECIMALS: usize = 17;

/// Formats a literal the host parses as a float: `20.0`, `(-0.5)`.
pub fn format_number(value: f64) -> String {
    let mut text = format!("{}", value);
    if text.len() > MAX_LITERAL_LEN && value.is_finite() {
        text = format!("{:.*}", LITERAL_DECIMALS, value);
        text.truncate(text.trim_end_matches('0').len());
        if text.ends_with('.') {
            text.push('0');
        }
    }
    if text.trim_start_matches('-') == "0.0" || value == 0.0 {
        return "0.0".to_string();
    }
    if !text.contains('.') && !text.contains("inf") && !text.contains("NaN") {
        text.push_str(".0");
    }
    if value.is_sign_negative() {
        format!("({})", text)
    } else {
        text
    }
}

fn is_binding_name(name: &str) -> bool {
    let mut chars = name.chars();
    let head_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    head_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED_NAMES.contains(&name)
}

/// Compile-run front of a [`Backend`]: carries the namespace, enforces the
/// host's length limit and keeps every property to a single rule.
pub struct Emitter<'a> {
    backend: &'a mut dyn Backend,
    namespace: Namespace,
    driven: HashSet<PropertyRef>,
    emitted: usize,
}

impl<'a> Emitter<'a> {
    pub fn new(backend: &'a mut dyn Backend, namespace: Namespace) -> Self {
        Self {
            backend,
            namespace,
            driven: HashSet::new(),
            emitted: 0,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn scalar(
        &mut self,
        owner: PropertyOwner,
        name: &str,
        spec: ScalarSpec,
    ) -> Result<ScalarValue, CompileError> {
        spec.validate()
            .map_err(|reason| CompileError::invalid(format!("scalar '{}': {}", name, reason)))?;
        self.backend.create_scalar(&self.namespace, &owner, name, spec)?;
        Ok(ScalarValue::new(owner, name, spec))
    }

    pub fn rotation_ref(&mut self, entity: &MechanismEntity) -> Result<PropertyRef, CompileError> {
        Ok(self.backend.create_rotation_ref(&self.namespace, entity)?)
    }

    pub fn emit(&mut self, builder: RuleBuilder) -> Result<ExpressionId, CompileError> {
        let rule = builder.build()?;

        let length = rule.expression.chars().count();
        let max = self.backend.max_expression_length();
        if length > max {
            return Err(CompileError::ExpressionTooLong {
                target: rule.target.to_string(),
                length,
                max,
            });
        }
        if !self.driven.insert(rule.target.clone()) {
            return Err(CompileError::invalid(format!(
                "{} is already driven by another rule",
                rule.target
            )));
        }

        debug!("Emitting {}", rule);
        let id = self.backend.create_expression(&self.namespace, &rule)?;
        self.emitted += 1;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::{BodyHandle, EntityId};

    fn scalar(name: &str) -> ScalarValue {
        ScalarValue::new(
            PropertyOwner::Body(BodyHandle::new(EntityId::new("rig"), "gear")),
            name,
            ScalarSpec::unbounded(0.0),
        )
    }

    #[test]
    fn test_variables_and_literals() {
        let rotation = scalar("Node0_rotation");
        let speed = scalar("Node0_speed");
        let rule = RuleBuilder::new(&rotation, "{curval} + {speed} * {k}")
            .self_value("curval", &rotation)
            .var("speed", &speed)
            .number("k", 2.0)
            .build()
            .unwrap();
        assert_eq!(rule.expression, "self.Node0_rotation + speed * 2.0");
        assert_eq!(rule.bindings.len(), 1);
        assert_eq!(rule.bindings[0].source, speed.property());
        assert!(rule.use_self);
    }

    #[test]
    fn test_dependency_binding_not_in_expression() {
        let prev = scalar("frame_prev");
        let delta = scalar("frame_delta");
        let rule = RuleBuilder::new(&prev, "frame")
            .depends_on("delta", &delta)
            .build()
            .unwrap();
        assert_eq!(rule.expression, "frame");
        assert_eq!(rule.binding("delta").unwrap().source, delta.property());
    }

    #[test]
    fn test_unknown_placeholder() {
        let x = scalar("x");
        let result = RuleBuilder::new(&x, "{missing} + 1.0").build();
        assert!(matches!(result, Err(CompileError::InvalidMechanism(_))));
    }

    #[test]
    fn test_unused_variable() {
        let x = scalar("x");
        let result = RuleBuilder::new(&x, "1.0").var("y", &scalar("y")).build();
        assert!(matches!(result, Err(CompileError::InvalidMechanism(_))));
    }

    #[test]
    fn test_reserved_variable_name() {
        let x = scalar("x");
        let result = RuleBuilder::new(&x, "{frame}").var("frame", &scalar("y")).build();
        assert!(matches!(result, Err(CompileError::InvalidMechanism(_))));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(20.0), "20.0");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(-0.5), "(-0.5)");
        assert_eq!(format_number(0.0), "0.0");
        assert_eq!(format_number(-0.0), "0.0");
    }

    #[test]
    fn test_format_number_bounds_tiny_values() {
        assert_eq!(format_number(1e-300), "0.0");
        assert_eq!(format_number(-1e-300), "0.0");
        assert_eq!(format_number(1.5e-10), "0.00000000015");
        assert_eq!(format_number(-2.5e-12), "(-0.0000000000025)");
        assert_eq!(format_number(0.1), "0.1");
        for value in [1e-20, 3.3e-18, 0.123456789e-7, 2.0e9 / 3.0] {
            assert!(format_number(value).len() <= MAX_LITERAL_LEN + 2, "{}", value);
        }
    }
}
