use serde::{Deserialize, Serialize};

/// Galleries named after a numeric id above this belong to that user.
const PERSONAL_ID_THRESHOLD: u64 = 10000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Delete,
    View,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PermissionConfig {
    pub superusers: Vec<String>,
    pub allow_add: bool,
    pub allow_del: bool,
    pub allow_view: bool,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            superusers: Vec::new(),
            allow_add: false,
            allow_del: false,
            allow_view: true,
        }
    }
}

impl PermissionConfig {
    pub fn is_superuser(&self, user_id: &str) -> bool {
        self.superusers.iter().any(|id| id == user_id)
    }

    fn allows_everyone(&self, operation: Operation) -> bool {
        match operation {
            Operation::Add => self.allow_add,
            Operation::Delete => self.allow_del,
            Operation::View => self.allow_view,
        }
    }

    /// Whether `user_id` may perform `operation` on `gallery`.
    ///
    /// Superusers always may. Otherwise, when the operation is closed to
    /// everyone or the gallery is someone's personal gallery, only the user
    /// whose id equals the gallery name may.
    pub fn check(&self, operation: Operation, user_id: &str, gallery: &str) -> bool {
        if self.is_superuser(user_id) {
            return true;
        }
        if self.allows_everyone(operation) && !is_personal_gallery(gallery) {
            return true;
        }
        user_id == gallery
    }
}

fn is_personal_gallery(name: &str) -> bool {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    // Too long for u64 is certainly above the threshold.
    name.parse::<u64>().map_or(true, |id| id > PERSONAL_ID_THRESHOLD)
}
