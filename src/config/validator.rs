use crate::config::EngineConfig;
use crate::models::{Scenario, ScenarioStep, WindowRef};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct ValidationRule {
    pub name: String,
    pub description: String,
    pub severity: ValidationSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub rule: ValidationRule,
    pub message: String,
    pub window: Option<WindowRef>,
    /// Index of the offending step, `None` for member declarations
    pub step: Option<usize>,
}

impl ValidationResult {
    pub fn is_error(&self) -> bool {
        self.rule.severity == ValidationSeverity::Error
    }
}

/// Sanity checks for scenario files before they are replayed
pub struct ScenarioValidator {
    rules: Vec<ValidationRule>,
    tolerance: i32,
}

impl ScenarioValidator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            rules: Self::default_rules(),
            tolerance: config.tolerance_px,
        }
    }

    pub fn validate(&self, scenario: &Scenario) -> Vec<ValidationResult> {
        let mut results = Vec::new();
        results.extend(self.validate_members(scenario));
        results.extend(self.validate_layout(scenario));
        results.extend(self.validate_steps(scenario));
        results
    }

    pub fn has_errors(results: &[ValidationResult]) -> bool {
        results.iter().any(ValidationResult::is_error)
    }

    fn validate_members(&self, scenario: &Scenario) -> Vec<ValidationResult> {
        let mut results = Vec::new();
        let mut seen = BTreeSet::new();

        for member in &scenario.members {
            if !seen.insert(&member.window) {
                results.push(self.result(
                    "duplicate_member",
                    format!("Window {} is declared more than once", member.window),
                    Some(&member.window),
                    None,
                ));
            }
            if member.bounds.width < 0 || member.bounds.height < 0 {
                results.push(self.result(
                    "negative_size",
                    format!(
                        "Window {} has negative size {}; it will be clamped",
                        member.window, member.bounds
                    ),
                    Some(&member.window),
                    None,
                ));
            }
        }

        results
    }

    fn validate_layout(&self, scenario: &Scenario) -> Vec<ValidationResult> {
        let mut results = Vec::new();
        let mut groups: BTreeMap<&str, Vec<_>> = BTreeMap::new();
        for member in &scenario.members {
            groups
                .entry(member.group.as_str())
                .or_default()
                .push(member.to_group_member());
        }

        for (group, members) in groups {
            for (index, member) in members.iter().enumerate() {
                let others = members
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != index)
                    .map(|(_, other)| other);

                let mut docked = false;
                for other in others {
                    if member.rect.shared_bounds(&other.rect, self.tolerance).has_shared_bounds() {
                        docked = true;
                    }
                    if member.window < other.window && member.rect.collides_with(&other.rect) {
                        results.push(self.result(
                            "overlapping_members",
                            format!(
                                "Windows {} and {} overlap in group '{}'",
                                member.window, other.window, group
                            ),
                            Some(&member.window),
                            None,
                        ));
                    }
                }

                if !docked && members.len() > 1 {
                    results.push(self.result(
                        "detached_member",
                        format!(
                            "Window {} does not touch any other member of group '{}'",
                            member.window, group
                        ),
                        Some(&member.window),
                        None,
                    ));
                }
            }
        }

        results
    }

    fn validate_steps(&self, scenario: &Scenario) -> Vec<ValidationResult> {
        let mut results = Vec::new();
        let mut present: BTreeSet<WindowRef> = scenario
            .members
            .iter()
            .map(|member| member.window.clone())
            .collect();
        let mut dragging: BTreeSet<WindowRef> = BTreeSet::new();

        for (index, step) in scenario.steps.iter().enumerate() {
            match step {
                ScenarioStep::Join(member) => {
                    if !present.insert(member.window.clone()) {
                        results.push(self.result(
                            "duplicate_member",
                            format!("Window {} joins while already a member", member.window),
                            Some(&member.window),
                            Some(index),
                        ));
                    }
                    continue;
                }
                ScenarioStep::Tick | ScenarioStep::Wait { .. } => continue,
                _ => {}
            }

            let Some(window) = step.window() else {
                continue;
            };
            if !present.contains(window) {
                results.push(self.result(
                    "unknown_window",
                    format!("Step {} refers to unknown window {}", index, window),
                    Some(window),
                    Some(index),
                ));
                continue;
            }

            match step {
                ScenarioStep::Changing { change_type, .. } => {
                    if let Some(code) = change_type {
                        if *code > 2 {
                            results.push(self.result(
                                "invalid_change_type",
                                format!("Step {} uses change type {}", index, code),
                                Some(window),
                                Some(index),
                            ));
                        }
                    }
                    dragging.insert(window.clone());
                }
                ScenarioStep::End { .. } => {
                    if !dragging.remove(window) {
                        results.push(self.result(
                            "unmatched_end",
                            format!("Step {} ends an interaction that never started", index),
                            Some(window),
                            Some(index),
                        ));
                    }
                }
                ScenarioStep::Leave { .. } => {
                    present.remove(window);
                }
                _ => {}
            }
        }

        for window in dragging {
            results.push(self.result(
                "unfinished_interaction",
                format!("Interaction on {} is never ended", window),
                Some(&window),
                None,
            ));
        }

        results
    }

    fn result(
        &self,
        rule_name: &str,
        message: String,
        window: Option<&WindowRef>,
        step: Option<usize>,
    ) -> ValidationResult {
        let rule = self
            .get_rule(rule_name)
            .unwrap_or_else(|| ValidationRule {
                name: rule_name.to_string(),
                description: String::new(),
                severity: ValidationSeverity::Warning,
            });
        ValidationResult {
            rule,
            message,
            window: window.cloned(),
            step,
        }
    }

    fn get_rule(&self, name: &str) -> Option<ValidationRule> {
        self.rules.iter().find(|rule| rule.name == name).cloned()
    }

    fn default_rules() -> Vec<ValidationRule> {
        vec![
            ValidationRule {
                name: "duplicate_member".to_string(),
                description: "A window can only be a member once".to_string(),
                severity: ValidationSeverity::Error,
            },
            ValidationRule {
                name: "unknown_window".to_string(),
                description: "Steps must refer to current members".to_string(),
                severity: ValidationSeverity::Error,
            },
            ValidationRule {
                name: "invalid_change_type".to_string(),
                description: "Change types are 0, 1 or 2".to_string(),
                severity: ValidationSeverity::Error,
            },
            ValidationRule {
                name: "negative_size".to_string(),
                description: "Negative sizes are clamped to zero".to_string(),
                severity: ValidationSeverity::Warning,
            },
            ValidationRule {
                name: "overlapping_members".to_string(),
                description: "Docked windows should not overlap".to_string(),
                severity: ValidationSeverity::Warning,
            },
            ValidationRule {
                name: "unmatched_end".to_string(),
                description: "An end step should follow a changing step".to_string(),
                severity: ValidationSeverity::Warning,
            },
            ValidationRule {
                name: "unfinished_interaction".to_string(),
                description: "Every interaction should be ended".to_string(),
                severity: ValidationSeverity::Warning,
            },
            ValidationRule {
                name: "detached_member".to_string(),
                description: "Detached members only ever translate with the group".to_string(),
                severity: ValidationSeverity::Info,
            },
        ]
    }
}

impl Default for ScenarioValidator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}
