//! Fixed prompts offered next to the chat box.

use serde::Serialize;
use thiserror::Error;

use crate::profile::ProfileRecord;

#[derive(Debug, Error, PartialEq)]
pub enum QuickActionError {
    #[error("Unknown quick action: {0}")]
    Unknown(String),

    #[error("A role name is required for this action")]
    MissingRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickAction {
    SummarizeSkills,
    BestProject,
    RolePitch,
}

/// What the page needs to draw one quick action button.
#[derive(Debug, Clone, Serialize)]
pub struct QuickActionInfo {
    pub id: QuickAction,
    pub label: &'static str,
    pub requires_role: bool,
}

impl QuickAction {
    pub const ALL: [QuickAction; 3] = [
        QuickAction::SummarizeSkills,
        QuickAction::BestProject,
        QuickAction::RolePitch,
    ];

    pub fn from_id(id: &str) -> Result<Self, QuickActionError> {
        match id {
            "summarize_skills" => Ok(QuickAction::SummarizeSkills),
            "best_project" => Ok(QuickAction::BestProject),
            "role_pitch" => Ok(QuickAction::RolePitch),
            other => Err(QuickActionError::Unknown(other.to_string())),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QuickAction::SummarizeSkills => "Summarize Skills",
            QuickAction::BestProject => "Show Best Project",
            QuickAction::RolePitch => "Generate Role Pitch",
        }
    }

    pub fn requires_role(self) -> bool {
        matches!(self, QuickAction::RolePitch)
    }

    pub fn info(self) -> QuickActionInfo {
        QuickActionInfo {
            id: self,
            label: self.label(),
            requires_role: self.requires_role(),
        }
    }

    /// Resolves the action into the user utterance that gets sent.
    /// `role` is only read by `RolePitch`, where it must be non-blank.
    pub fn prompt(
        self,
        profile: &ProfileRecord,
        role: Option<&str>,
    ) -> Result<String, QuickActionError> {
        let first = profile.first_name();
        match self {
            QuickAction::SummarizeSkills => {
                Ok(format!("Summarize {first}'s key skills and expertise."))
            }
            QuickAction::BestProject => Ok(format!("Show me {first}'s best project in AI.")),
            QuickAction::RolePitch => {
                let role = role
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .ok_or(QuickActionError::MissingRole)?;
                Ok(format!(
                    "Generate a concise, tailored pitch statement for the role of \"{role}\"."
                ))
            }
        }
    }
}

pub fn list_quick_actions() -> Vec<QuickActionInfo> {
    QuickAction::ALL.iter().map(|a| a.info()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ProfileRecord {
        ProfileRecord::embedded().unwrap()
    }

    #[test]
    fn test_fixed_prompts_use_first_name() {
        let p = profile();
        assert_eq!(
            QuickAction::SummarizeSkills.prompt(&p, None).unwrap(),
            "Summarize Sumit's key skills and expertise."
        );
        assert_eq!(
            QuickAction::BestProject.prompt(&p, None).unwrap(),
            "Show me Sumit's best project in AI."
        );
    }

    #[test]
    fn test_role_pitch_interpolates_trimmed_role() {
        let prompt = QuickAction::RolePitch
            .prompt(&profile(), Some("  Senior Python Developer "))
            .unwrap();
        assert_eq!(
            prompt,
            "Generate a concise, tailored pitch statement for the role of \"Senior Python Developer\"."
        );
    }

    #[test]
    fn test_role_pitch_requires_role() {
        let p = profile();
        assert_eq!(
            QuickAction::RolePitch.prompt(&p, None),
            Err(QuickActionError::MissingRole)
        );
        assert_eq!(
            QuickAction::RolePitch.prompt(&p, Some("   ")),
            Err(QuickActionError::MissingRole)
        );
    }

    #[test]
    fn test_fixed_prompts_ignore_role() {
        let prompt = QuickAction::BestProject
            .prompt(&profile(), Some("ignored"))
            .unwrap();
        assert!(!prompt.contains("ignored"));
    }

    #[test]
    fn test_from_id_round_trips_listing() {
        for info in list_quick_actions() {
            let id = serde_json::to_value(info.id).unwrap();
            let parsed = QuickAction::from_id(id.as_str().unwrap()).unwrap();
            assert_eq!(parsed, info.id);
        }
    }

    #[test]
    fn test_unknown_id() {
        assert_eq!(
            QuickAction::from_id("write_poem"),
            Err(QuickActionError::Unknown("write_poem".to_string()))
        );
    }
}
