use super::window::{BoundsChangingPayload, ChangeType, GroupMember, PartialBounds, WindowRef};
use crate::config::ConfigError;
use crate::geometry::{RectDelta, Rectangle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_GROUP_NAME: &str = "main";

fn default_group_name() -> String {
    DEFAULT_GROUP_NAME.to_string()
}

/// A window placed into a named group; `bounds` are host coordinates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioMember {
    pub window: WindowRef,
    #[serde(default = "default_group_name")]
    pub group: String,
    pub bounds: Rectangle,
    #[serde(default)]
    pub offset: RectDelta,
}

impl ScenarioMember {
    pub fn to_group_member(&self) -> GroupMember {
        GroupMember::new(
            self.window.clone(),
            Rectangle::normalize_external(&self.bounds, &self.offset),
        )
        .with_offset(self.offset)
    }
}

/// One host notification replayed against a group registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Bounds reported while the user drags or resizes `window`
    Changing {
        window: WindowRef,
        bounds: Rectangle,
        #[serde(default)]
        change_type: Option<u8>,
    },
    /// One coalescing tick for every group
    Tick,
    /// The user released `window`
    End { window: WindowRef },
    SetBounds {
        window: WindowRef,
        bounds: PartialBounds,
    },
    UpdateBounds {
        window: WindowRef,
        delta: PartialBounds,
    },
    Join(ScenarioMember),
    Leave { window: WindowRef },
    /// Sleep in real-time mode; ignored otherwise
    Wait { ms: u64 },
}

impl ScenarioStep {
    /// Window the step refers to, if any
    pub fn window(&self) -> Option<&WindowRef> {
        match self {
            ScenarioStep::Changing { window, .. }
            | ScenarioStep::End { window }
            | ScenarioStep::SetBounds { window, .. }
            | ScenarioStep::UpdateBounds { window, .. }
            | ScenarioStep::Leave { window } => Some(window),
            ScenarioStep::Join(member) => Some(&member.window),
            ScenarioStep::Tick | ScenarioStep::Wait { .. } => None,
        }
    }

    /// Host payload for a `changing` step. Without an explicit tag the change
    /// type is derived from the delta against `current`.
    pub fn changing_payload(&self, current: &Rectangle) -> Option<BoundsChangingPayload> {
        match self {
            ScenarioStep::Changing {
                bounds,
                change_type,
                ..
            } => {
                let tag = change_type
                    .unwrap_or_else(|| ChangeType::classify(&current.delta(bounds)).code());
                Some(BoundsChangingPayload {
                    x: bounds.x,
                    y: bounds.y,
                    width: bounds.width,
                    height: bounds.height,
                    change_type: tag,
                })
            }
            _ => None,
        }
    }
}

/// Scripted sequence of group notifications loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default, rename = "member")]
    pub members: Vec<ScenarioMember>,
    #[serde(default, rename = "step")]
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Names of the groups in order of first appearance
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let joined = self.steps.iter().filter_map(|step| match step {
            ScenarioStep::Join(member) => Some(member),
            _ => None,
        });
        for member in self.members.iter().chain(joined) {
            if !names.contains(&member.group) {
                names.push(member.group.clone());
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
        [[member]]
        window = "app/a"
        bounds = { x = 0, y = 0, width = 100, height = 100 }

        [[member]]
        window = "app/b"
        bounds = { x = 100, y = 0, width = 100, height = 100 }
        offset = { x = -7, width = 14 }

        [[step]]
        kind = "changing"
        window = "app/a"
        bounds = { x = 0, y = 0, width = 110, height = 100 }

        [[step]]
        kind = "tick"

        [[step]]
        kind = "set_bounds"
        window = "app/b"
        bounds = { x = 120 }

        [[step]]
        kind = "join"
        window = "app/c"
        group = "side"
        bounds = { x = 500, y = 0, width = 50, height = 50 }

        [[step]]
        kind = "end"
        window = "app/a"
    "#;

    #[test]
    fn parses_members_and_steps() {
        let scenario = Scenario::from_toml_str(SCENARIO).unwrap();

        assert_eq!(scenario.members.len(), 2);
        assert_eq!(scenario.members[0].group, DEFAULT_GROUP_NAME);
        assert_eq!(scenario.members[1].offset, RectDelta::new(-7, 0, 14, 0));
        assert_eq!(scenario.steps.len(), 5);
        assert_eq!(scenario.steps[1], ScenarioStep::Tick);
        assert_eq!(
            scenario.steps[2],
            ScenarioStep::SetBounds {
                window: WindowRef::new("app", "b"),
                bounds: PartialBounds {
                    x: Some(120),
                    ..Default::default()
                },
            }
        );
        assert_eq!(scenario.group_names(), vec!["main", "side"]);
    }

    #[test]
    fn changing_payload_derives_missing_tag() {
        let scenario = Scenario::from_toml_str(SCENARIO).unwrap();
        let payload = scenario.steps[0]
            .changing_payload(&Rectangle::new(0, 0, 100, 100))
            .unwrap();
        assert_eq!(payload.change_type, ChangeType::Size.code());
    }

    #[test]
    fn member_bounds_are_normalized() {
        let scenario = Scenario::from_toml_str(SCENARIO).unwrap();
        let member = scenario.members[1].to_group_member();
        assert_eq!(member.rect, Rectangle::new(107, 0, 86, 100));
        assert_eq!(member.external_bounds(), scenario.members[1].bounds);
    }

    #[test]
    fn rejects_bad_window_reference() {
        let result = Scenario::from_toml_str(
            r#"
            [[member]]
            window = "missing-slash"
            bounds = { x = 0, y = 0, width = 1, height = 1 }
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
