use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform-wide administrator, not bound to any college
    SuperAdmin,
    CollegeAdmin,
    Faculty,
    Student,
    #[serde(other)]
    Other,
}

impl Role {
    pub fn is_global(&self) -> bool {
        matches!(self, Self::SuperAdmin)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::CollegeAdmin => "college_admin",
            Self::Faculty => "faculty",
            Self::Student => "student",
            Self::Other => "other",
        }
    }
}

/// The signed-in user as seen by the core.
///
/// Passed by value into every component; nothing in the core reads the current
/// user from shared state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub college_id: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    /// Groups this identity is a member of
    #[serde(default)]
    pub group_ids: Vec<String>,
    /// Groups this identity follows without being a member
    #[serde(default)]
    pub followed_group_ids: Vec<String>,
    /// Pending approval. Unapproved identities still get a full read scope.
    #[serde(default = "default_true")]
    pub approved: bool,
    #[serde(default)]
    pub frozen: bool,
}

fn default_true() -> bool {
    true
}

impl Identity {
    pub fn new(id: impl Into<String>, role: Role, college_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            role,
            department: String::new(),
            college_id: college_id.map(str::to_string),
            interests: Vec::new(),
            group_ids: Vec::new(),
            followed_group_ids: Vec::new(),
            approved: true,
            frozen: false,
        }
    }

    pub fn with_department(mut self, department: &str) -> Self {
        self.department = department.to_string();
        self
    }

    pub fn with_interests(mut self, interests: &[&str]) -> Self {
        self.interests = interests.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_groups(mut self, group_ids: &[&str]) -> Self {
        self.group_ids = group_ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_followed_groups(mut self, group_ids: &[&str]) -> Self {
        self.followed_group_ids = group_ids.iter().map(|s| s.to_string()).collect();
        self
    }
}
