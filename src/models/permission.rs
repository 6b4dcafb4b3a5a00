use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::catalogue::{EmployeeGrantSplit, PermissionGroup};
use crate::authz::{AccountStatus, Role};
use crate::events::{Loggable, Severity};

/// A set of capability tokens. Duplicates collapse, iteration is sorted.
///
/// There is no "missing" variant: an identity without a stored record holds
/// `GrantSet::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrantSet(BTreeSet<String>);

impl GrantSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn insert(&mut self, token: impl Into<String>) -> bool {
        self.0.insert(token.into())
    }

    pub fn is_superset_of(&self, other: &GrantSet) -> bool {
        self.0.is_superset(&other.0)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<'a> FromIterator<&'a str> for GrantSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

impl FromIterator<String> for GrantSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> Extend<&'a str> for GrantSet {
    fn extend<I: IntoIterator<Item = &'a str>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(str::to_string));
    }
}

/// The stored grant record of one identity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserPermissions {
    pub user_id: Uuid,
    #[schema(value_type = Vec<String>)]
    pub permissions: GrantSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for UserPermissions {
    fn entity_type() -> &'static str { "user_permissions" }
    fn subject_id(&self) -> Uuid { self.user_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionsRequest {
    #[schema(example = json!(["view_statistics", "manage_prices"]))]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermissionsRequest {
    pub user_id: Uuid,
    #[schema(example = json!(["view_statistics"]))]
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionsData {
    pub user_id: Uuid,
    pub permissions: Vec<String>,
}

impl PermissionsData {
    pub fn new(user_id: Uuid, grants: &GrantSet) -> Self {
        Self {
            user_id,
            permissions: grants.to_vec(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmployeeCatalogue {
    #[schema(value_type = Vec<String>)]
    pub default: Vec<&'static str>,
    #[schema(value_type = Vec<String>)]
    pub manageable: Vec<&'static str>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AvailablePermissions {
    pub groups: Vec<PermissionGroup>,
    #[schema(value_type = Vec<String>)]
    pub all: Vec<&'static str>,
    pub employee: EmployeeCatalogue,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmployeePermissions {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: AccountStatus,
    pub permissions: Vec<String>,
    #[serde(flatten)]
    pub split: EmployeeGrantSplit,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmployeeList {
    pub employees: Vec<EmployeePermissions>,
    pub employee: EmployeeCatalogue,
}
