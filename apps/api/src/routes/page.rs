//! The page itself plus the static data its sidebar draws from.

use axum::{extract::State, response::Html, Json};
use serde::Serialize;

use crate::profile::quick_actions::{list_quick_actions, QuickActionInfo};
use crate::profile::{ProfileLink, ProfileRecord};
use crate::state::AppState;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Everything the sidebar shows, flattened out of the profile record.
#[derive(Debug, Serialize)]
pub struct SidebarView {
    pub name: String,
    pub title: String,
    pub email: String,
    pub location: String,
    pub links: Vec<ProfileLink>,
    pub best_projects: Vec<String>,
    pub skill_categories: Vec<String>,
    pub quick_actions: Vec<QuickActionInfo>,
}

impl SidebarView {
    fn from_profile(profile: &ProfileRecord) -> Self {
        let info = &profile.personal_info;
        Self {
            name: info.name.clone(),
            title: info.title.clone(),
            email: info.email.clone(),
            location: info.location.clone(),
            links: profile.links(),
            best_projects: profile.best_projects().map(|p| p.name.clone()).collect(),
            skill_categories: profile.skill_categories().map(str::to_string).collect(),
            quick_actions: list_quick_actions(),
        }
    }
}

/// GET /
pub async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /api/v1/profile
pub async fn handle_get_profile(State(state): State<AppState>) -> Json<ProfileRecord> {
    Json(state.profile.as_ref().clone())
}

/// GET /api/v1/sidebar
pub async fn handle_get_sidebar(State(state): State<AppState>) -> Json<SidebarView> {
    Json(SidebarView::from_profile(&state.profile))
}

/// GET /api/v1/quick-actions
pub async fn handle_list_quick_actions() -> Json<Vec<QuickActionInfo>> {
    Json(list_quick_actions())
}
