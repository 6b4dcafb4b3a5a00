use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Retention class of an activity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Never auto-deleted. Every authorization change is critical.
    Critical,
    #[default]
    Important,
    Noise,
}

/// An entity whose mutations are written to the activity log.
pub trait Loggable: Serialize + Send + Sync {
    /// Prefix of the event name, e.g. `user_permissions` in `user_permissions.updated`
    fn entity_type() -> &'static str;

    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" => Severity::Critical,
            _ => self.severity(),
        }
    }
}
