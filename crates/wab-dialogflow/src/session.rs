//! Dialogflow session paths
//!
//! A session scopes conversational context inside the agent. One session
//! is used per WhatsApp sender, so the sender address is the session id.

use std::fmt;

/// `projects/{project_id}/agent/sessions/{session_id}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPath {
    project_id: String,
    session_id: String,
}

impl SessionPath {
    /// Build the session path for a sender of the given agent
    pub fn new(project_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            session_id: session_id.into(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl fmt::Display for SessionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/agent/sessions/{}",
            self.project_id, self.session_id
        )
    }
}
