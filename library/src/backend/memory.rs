//! In-memory host.
//!
//! Stores scalars, live rotations and rules, and evaluates rules the way a
//! reactive host does: pull-based, one evaluation per rule per frame, bindings
//! first, results committed immediately. Self-access reads whatever value is
//! committed at the time the expression runs.

use std::collections::{BTreeMap, HashMap};

use evalexpr::{
    ContextWithMutableFunctions, ContextWithMutableVariables, EvalexprError, Function,
    HashMapContext, Node as ExpressionTree, Value,
};
use log::{debug, trace};

use super::{Backend, ExpressionId, Namespace};
use crate::error::BackendError;
use crate::model::entity::{EntityId, MechanismEntity, PropertyOwner};
use crate::model::rule::Rule;
use crate::model::value::{PropertyRef, ScalarSpec};

pub const DEFAULT_MAX_EXPRESSION_LENGTH: usize = 256;

/// Host variable holding the frame being evaluated.
const FRAME_VARIABLE: &str = "frame";
const SELF_PREFIX: &str = "self.";

#[derive(Clone, Debug)]
struct StoredScalar {
    namespace: Namespace,
    spec: ScalarSpec,
    value: f64,
}

#[derive(Clone, Debug)]
struct StoredRule {
    id: ExpressionId,
    namespace: Namespace,
    rule: Rule,
    tree: ExpressionTree,
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

#[derive(Debug)]
pub struct MemoryBackend {
    max_expression_length: usize,
    scalars: BTreeMap<PropertyRef, StoredScalar>,
    rotations: BTreeMap<PropertyRef, f64>,
    rules: Vec<StoredRule>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_max_expression_length(DEFAULT_MAX_EXPRESSION_LENGTH)
    }

    pub fn with_max_expression_length(max_expression_length: usize) -> Self {
        Self {
            max_expression_length,
            scalars: BTreeMap::new(),
            rotations: BTreeMap::new(),
            rules: Vec::new(),
        }
    }

    pub fn scalar(&self, property: &PropertyRef) -> Option<f64> {
        self.scalars.get(property).map(|s| s.value)
    }

    pub fn scalar_spec(&self, property: &PropertyRef) -> Option<ScalarSpec> {
        self.scalars.get(property).map(|s| s.spec)
    }

    /// Overwrites a stored scalar, clamped to its bounds.
    pub fn set_scalar(&mut self, property: &PropertyRef, value: f64) -> Result<(), BackendError> {
        let stored = self
            .scalars
            .get_mut(property)
            .ok_or_else(|| BackendError::UnknownProperty(property.to_string()))?;
        stored.value = stored.spec.clamp(value);
        Ok(())
    }

    pub fn scalar_count(&self) -> usize {
        self.scalars.len()
    }

    pub fn rotation(&self, entity: &MechanismEntity) -> Option<f64> {
        self.rotations.get(&PropertyRef::rotation(entity)).copied()
    }

    /// Poses a body. Bodies are host-owned, so this also registers unknown ones.
    pub fn set_rotation(&mut self, entity: &MechanismEntity, value: f64) {
        self.rotations.insert(PropertyRef::rotation(entity), value);
    }

    /// Installed rules in registration order.
    pub fn rules(&self) -> Vec<&Rule> {
        self.rules.iter().map(|r| &r.rule).collect()
    }

    pub fn rule_for(&self, target: &PropertyRef) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|r| &r.rule.target == target)
            .map(|r| &r.rule)
    }

    pub fn expression_ids(&self) -> Vec<ExpressionId> {
        self.rules.iter().map(|r| r.id).collect()
    }

    /// Runs one evaluation pass at `frame`.
    ///
    /// Rules are visited in reverse registration order; the result must not
    /// depend on it, since a real host schedules purely by bindings.
    pub fn evaluate_frame(&mut self, frame: i64) -> Result<(), BackendError> {
        let mut marks: HashMap<usize, Mark> = HashMap::new();
        for index in (0..self.rules.len()).rev() {
            self.evaluate_rule(index, frame, &mut marks)?;
        }
        trace!("Evaluated {} rules at frame {}", self.rules.len(), frame);
        Ok(())
    }

    fn evaluate_rule(
        &mut self,
        index: usize,
        frame: i64,
        marks: &mut HashMap<usize, Mark>,
    ) -> Result<(), BackendError> {
        match marks.get(&index) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(BackendError::RuleCycle(
                    self.rules[index].rule.target.to_string(),
                ));
            }
            None => {}
        }
        marks.insert(index, Mark::Visiting);

        let dependencies: Vec<usize> = self.rules[index]
            .rule
            .bindings
            .iter()
            .filter_map(|b| self.driver_of(&b.source))
            .collect();
        for dependency in dependencies {
            self.evaluate_rule(dependency, frame, marks)?;
        }

        let stored = &self.rules[index];
        let context = self.expression_context(&stored.rule, frame)?;
        let value = stored
            .tree
            .eval_with_context(&context)
            .map_err(|e| evaluation_error(&stored.rule, e))
            .and_then(|v| value_to_f64(&stored.rule, v))?;
        let target = stored.rule.target.clone();
        self.commit(&target, value)?;

        marks.insert(index, Mark::Done);
        Ok(())
    }

    fn driver_of(&self, property: &PropertyRef) -> Option<usize> {
        self.rules.iter().position(|r| &r.rule.target == property)
    }

    fn read(&self, property: &PropertyRef) -> Result<f64, BackendError> {
        let value = match property {
            PropertyRef::Scalar { .. } => self.scalar(property),
            PropertyRef::Rotation { .. } => self.rotations.get(property).copied(),
        };
        value.ok_or_else(|| BackendError::UnknownProperty(property.to_string()))
    }

    fn commit(&mut self, target: &PropertyRef, value: f64) -> Result<(), BackendError> {
        match target {
            PropertyRef::Scalar { .. } => self.set_scalar(target, value),
            PropertyRef::Rotation { .. } => {
                self.rotations.insert(target.clone(), value);
                Ok(())
            }
        }
    }

    fn expression_context(&self, rule: &Rule, frame: i64) -> Result<HashMapContext, BackendError> {
        let mut context = HashMapContext::new();
        let mut set = |name: String, value: f64| {
            context
                .set_value(name, Value::Float(value))
                .map_err(|e| evaluation_error(rule, e))
        };

        set(FRAME_VARIABLE.to_string(), frame as f64)?;
        for binding in &rule.bindings {
            set(binding.name.clone(), self.read(&binding.source)?)?;
        }

        if rule.use_self {
            let owner = rule.target.owner();
            for (property, stored) in &self.scalars {
                if property.owner() == owner {
                    set(property.self_path(), stored.value)?;
                }
            }
            for (property, value) in &self.rotations {
                if property.owner() == owner {
                    set(property.self_path(), *value)?;
                }
            }
        }

        register_host_functions(&mut context).map_err(|e| evaluation_error(rule, e))?;
        Ok(context)
    }

    /// Rejects expressions that do not parse or read variables the host would
    /// not provide.
    fn check_expression(&self, rule: &Rule) -> Result<ExpressionTree, BackendError> {
        let tree =
            evalexpr::build_operator_tree(&rule.expression).map_err(|e| evaluation_error(rule, e))?;
        for identifier in tree.iter_variable_identifiers() {
            let known = identifier == FRAME_VARIABLE
                || rule.binding(identifier).is_some()
                || (rule.use_self && identifier.starts_with(SELF_PREFIX));
            if !known {
                return Err(BackendError::Evaluation {
                    target: rule.target.to_string(),
                    message: format!("unbound variable '{}'", identifier),
                });
            }
        }
        Ok(tree)
    }
}

impl Backend for MemoryBackend {
    fn max_expression_length(&self) -> usize {
        self.max_expression_length
    }

    fn create_scalar(
        &mut self,
        namespace: &Namespace,
        owner: &PropertyOwner,
        name: &str,
        spec: ScalarSpec,
    ) -> Result<PropertyRef, BackendError> {
        if !is_identifier(name) {
            return Err(BackendError::InvalidName(name.to_string()));
        }
        spec.validate().map_err(|reason| BackendError::InvalidBounds {
            name: name.to_string(),
            reason,
        })?;

        let property = PropertyRef::scalar(owner.clone(), name);
        match self.scalars.get_mut(&property) {
            Some(stored) if &stored.namespace != namespace => {
                return Err(BackendError::InvalidName(format!(
                    "{} belongs to namespace {}",
                    property, stored.namespace
                )));
            }
            Some(stored) => {
                stored.spec = spec;
                stored.value = spec.clamp(stored.value);
            }
            None => {
                self.scalars.insert(
                    property.clone(),
                    StoredScalar {
                        namespace: namespace.clone(),
                        spec,
                        value: spec.default,
                    },
                );
            }
        }
        Ok(property)
    }

    fn create_rotation_ref(
        &mut self,
        _namespace: &Namespace,
        entity: &MechanismEntity,
    ) -> Result<PropertyRef, BackendError> {
        let property = PropertyRef::rotation(entity);
        self.rotations.entry(property.clone()).or_insert(0.0);
        Ok(property)
    }

    fn create_expression(
        &mut self,
        namespace: &Namespace,
        rule: &Rule,
    ) -> Result<ExpressionId, BackendError> {
        if self.driver_of(&rule.target).is_some() {
            return Err(BackendError::AlreadyDriven(rule.target.to_string()));
        }
        self.read(&rule.target)?;
        for binding in &rule.bindings {
            if !is_identifier(&binding.name) {
                return Err(BackendError::InvalidName(binding.name.clone()));
            }
            self.read(&binding.source)?;
        }
        let tree = self.check_expression(rule)?;

        let id = ExpressionId::new();
        debug!("[{}] {} ({})", namespace, rule, id);
        self.rules.push(StoredRule {
            id,
            namespace: namespace.clone(),
            rule: rule.clone(),
            tree,
        });
        Ok(id)
    }

    fn clear_namespace(
        &mut self,
        namespace: &Namespace,
        entity: &EntityId,
    ) -> Result<(), BackendError> {
        let rules_before = self.rules.len();
        let scalars_before = self.scalars.len();
        self.rules
            .retain(|r| !(&r.namespace == namespace && r.rule.target.entity() == entity));
        self.scalars
            .retain(|p, s| !(&s.namespace == namespace && p.entity() == entity));
        debug!(
            "Cleared {} rules and {} scalars of namespace {} on {}",
            rules_before - self.rules.len(),
            scalars_before - self.scalars.len(),
            namespace,
            entity
        );
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn evaluation_error(rule: &Rule, error: EvalexprError) -> BackendError {
    BackendError::Evaluation {
        target: rule.target.to_string(),
        message: error.to_string(),
    }
}

fn value_to_f64(rule: &Rule, value: Value) -> Result<f64, BackendError> {
    match value {
        Value::Float(f) => Ok(f),
        Value::Int(i) => Ok(i as f64),
        Value::Boolean(b) => Ok(if b { 1.0 } else { 0.0 }),
        other => Err(BackendError::Evaluation {
            target: rule.target.to_string(),
            message: format!("expression did not evaluate to a number: {}", other),
        }),
    }
}

fn truthy(value: &Value) -> Result<bool, EvalexprError> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Float(f) => Ok(*f != 0.0),
        Value::Int(i) => Ok(*i != 0),
        other => Err(EvalexprError::expected_boolean(other.clone())),
    }
}

fn register_host_functions(context: &mut HashMapContext) -> Result<(), EvalexprError> {
    // if(condition, then, else); numeric conditions are true when non-zero
    context.set_function(
        "if".to_string(),
        Function::new(|args| {
            let tuple = args.as_tuple()?;
            if tuple.len() != 3 {
                return Err(EvalexprError::CustomMessage(format!(
                    "if expects 3 arguments, got {}",
                    tuple.len()
                )));
            }
            if truthy(&tuple[0])? {
                Ok(tuple[1].clone())
            } else {
                Ok(tuple[2].clone())
            }
        }),
    )?;

    context.set_function(
        "floor".to_string(),
        Function::new(|args| Ok(Value::Float(args.as_number()?.floor()))),
    )?;

    context.set_function(
        "round".to_string(),
        Function::new(|args| Ok(Value::Float(args.as_number()?.round()))),
    )?;

    Ok(())
}
