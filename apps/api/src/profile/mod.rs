//! Profile record: the static résumé document that grounds every assistant answer.
//!
//! The document is compiled into the binary (`data/profile.json`) and parsed once at
//! startup. After that it is only ever handed out behind shared references.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod prompts;
pub mod quick_actions;

const EMBEDDED_PROFILE: &str = include_str!("../../data/profile.json");

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Profile document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Profile document is invalid: {0}")]
    Invalid(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    /// Bumped whenever the document content changes.
    pub version: u32,
    pub personal_info: PersonalInfo,
    pub summary: String,
    pub experience: Vec<ExperienceEntry>,
    pub projects: Vec<ProjectEntry>,
    pub skills: Vec<SkillGroup>,
    pub education: Vec<EducationEntry>,
    pub achievements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub name: String,
    pub title: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub portfolio: String,
    pub linkedin: String,
    pub github: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceEntry {
    pub company: String,
    pub location: String,
    pub title: String,
    pub period: String,
    pub responsibilities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEntry {
    pub name: String,
    pub description: String,
    pub technologies: Vec<String>,
    pub link: Option<String>,
    #[serde(default)]
    pub best_project: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillGroup {
    pub category: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationEntry {
    pub institution: String,
    pub degree: String,
    pub period: String,
}

/// A labelled external link shown in the sidebar.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileLink {
    pub label: &'static str,
    pub url: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Loading & validation
// ────────────────────────────────────────────────────────────────────────────

impl ProfileRecord {
    /// Parses and validates the document compiled into the binary.
    pub fn embedded() -> Result<Self, ProfileError> {
        Self::from_json(EMBEDDED_PROFILE)
    }

    pub fn from_json(raw: &str) -> Result<Self, ProfileError> {
        let profile: ProfileRecord = serde_json::from_str(raw)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Rejects documents the assistant cannot be grounded on.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.personal_info.name.trim().is_empty() {
            return Err(ProfileError::Invalid("personal name is empty".to_string()));
        }

        for project in &self.projects {
            if project.name.trim().is_empty() {
                return Err(ProfileError::Invalid("project with empty name".to_string()));
            }
            if let Some(link) = &project.link {
                if !is_web_url(link) {
                    return Err(ProfileError::Invalid(format!(
                        "project '{}' has a non-http link: {link}",
                        project.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// First word of the display name, used in quick action prompts.
    pub fn first_name(&self) -> &str {
        self.personal_info
            .name
            .split_whitespace()
            .next()
            .unwrap_or(&self.personal_info.name)
    }

    pub fn best_projects(&self) -> impl Iterator<Item = &ProjectEntry> {
        self.projects.iter().filter(|p| p.best_project)
    }

    /// Portfolio, LinkedIn and GitHub links, skipping blanks.
    pub fn links(&self) -> Vec<ProfileLink> {
        let info = &self.personal_info;
        [
            ("portfolio", &info.portfolio),
            ("linkedin", &info.linkedin),
            ("github", &info.github),
        ]
        .into_iter()
        .filter(|(_, url)| !url.trim().is_empty())
        .map(|(label, url)| ProfileLink {
            label,
            url: url.clone(),
        })
        .collect()
    }

    pub fn skill_categories(&self) -> impl Iterator<Item = &str> {
        self.skills.iter().map(|g| g.category.as_str())
    }
}

fn is_web_url(link: &str) -> bool {
    link.starts_with("https://") || link.starts_with("http://")
}
