use std::fmt::Write;

use gearsim::model::NodeKind;
use gearsim::{MechanismEntity, MechanismGraph, MemoryBackend, Rule};

/// One line per rule, in registration order.
pub fn rules_text(rules: &[&Rule]) -> String {
    let mut out = String::new();
    for (index, rule) in rules.iter().enumerate() {
        let _ = writeln!(out, "{:>3}  {}", index, rule);
    }
    out
}

pub fn rules_json(rules: &[&Rule]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(rules)
}

/// Targets of all gear nodes, deduplicated, in graph order.
pub fn gear_targets(graph: &MechanismGraph) -> Vec<MechanismEntity> {
    let mut targets: Vec<MechanismEntity> = Vec::new();
    for node in &graph.nodes {
        if let NodeKind::Gear(gear) = &node.kind {
            if !targets.contains(&gear.target) {
                targets.push(gear.target.clone());
            }
        }
    }
    targets
}

pub fn frame_header(targets: &[MechanismEntity]) -> String {
    let mut out = format!("{:>6}", "frame");
    for target in targets {
        let _ = write!(out, "  {:>24}", target.to_string());
    }
    out
}

pub fn frame_row(frame: i64, targets: &[MechanismEntity], backend: &MemoryBackend) -> String {
    let mut out = format!("{:>6}", frame);
    for target in targets {
        match backend.rotation(target) {
            Some(value) => {
                let _ = write!(out, "  {:>24.6}", value);
            }
            None => {
                let _ = write!(out, "  {:>24}", "-");
            }
        }
    }
    out
}
