//! The closed catalogue of capability tokens.
//!
//! Tokens are flat snake_case strings grouped by domain. Two employee subsets
//! are carved out of it: the defaults every employee implicitly holds, and the
//! manageable tokens an administrator toggles per employee. This is the single
//! authoritative list; nothing else in the crate defines employee defaults.

use std::collections::BTreeSet;

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::permission::GrantSet;

// Account management
pub const VIEW_USERS: &str = "view_users";
pub const MANAGE_USERS: &str = "manage_users";
pub const BAN_USERS: &str = "ban_users";
pub const MANAGE_PERMISSIONS: &str = "manage_permissions";

// Content moderation
pub const VIEW_POSTS: &str = "view_posts";
pub const APPROVE_POSTS: &str = "approve_posts";
pub const REJECT_POSTS: &str = "reject_posts";
pub const DELETE_POSTS: &str = "delete_posts";
pub const MANAGE_REPORTS: &str = "manage_reports";

// Projects and listings
pub const VIEW_PROJECTS: &str = "view_projects";
pub const CREATE_PROJECTS: &str = "create_projects";
pub const EDIT_PROJECTS: &str = "edit_projects";
pub const DELETE_PROJECTS: &str = "delete_projects";
pub const MANAGE_PRICES: &str = "manage_prices";

// News
pub const VIEW_NEWS: &str = "view_news";
pub const CREATE_NEWS: &str = "create_news";
pub const EDIT_NEWS: &str = "edit_news";
pub const DELETE_NEWS: &str = "delete_news";

// Transactions
pub const VIEW_TRANSACTIONS: &str = "view_transactions";
pub const VIEW_PAYMENT_DETAILS: &str = "view_payment_details";

// Statistics and reporting
pub const VIEW_DASHBOARD: &str = "view_dashboard";
pub const VIEW_STATISTICS: &str = "view_statistics";
pub const EXPORT_REPORTS: &str = "export_reports";

// Settings
pub const VIEW_SETTINGS: &str = "view_settings";
pub const EDIT_SETTINGS: &str = "edit_settings";

// Locations and reference data
pub const VIEW_LOCATIONS: &str = "view_locations";
pub const MANAGE_LOCATIONS: &str = "manage_locations";
pub const MANAGE_CATEGORIES: &str = "manage_categories";

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct PermissionGroup {
    #[schema(value_type = String)]
    pub key: &'static str,
    #[schema(value_type = String)]
    pub label: &'static str,
    #[schema(value_type = Vec<String>)]
    pub permissions: &'static [&'static str],
}

pub const GROUPS: &[PermissionGroup] = &[
    PermissionGroup {
        key: "accounts",
        label: "Account management",
        permissions: &[VIEW_USERS, MANAGE_USERS, BAN_USERS, MANAGE_PERMISSIONS],
    },
    PermissionGroup {
        key: "moderation",
        label: "Content moderation",
        permissions: &[VIEW_POSTS, APPROVE_POSTS, REJECT_POSTS, DELETE_POSTS, MANAGE_REPORTS],
    },
    PermissionGroup {
        key: "projects",
        label: "Projects and listings",
        permissions: &[VIEW_PROJECTS, CREATE_PROJECTS, EDIT_PROJECTS, DELETE_PROJECTS, MANAGE_PRICES],
    },
    PermissionGroup {
        key: "news",
        label: "News",
        permissions: &[VIEW_NEWS, CREATE_NEWS, EDIT_NEWS, DELETE_NEWS],
    },
    PermissionGroup {
        key: "transactions",
        label: "Transactions",
        permissions: &[VIEW_TRANSACTIONS, VIEW_PAYMENT_DETAILS],
    },
    PermissionGroup {
        key: "statistics",
        label: "Statistics and reporting",
        permissions: &[VIEW_DASHBOARD, VIEW_STATISTICS, EXPORT_REPORTS],
    },
    PermissionGroup {
        key: "settings",
        label: "Settings",
        permissions: &[VIEW_SETTINGS, EDIT_SETTINGS],
    },
    PermissionGroup {
        key: "locations",
        label: "Locations and reference data",
        permissions: &[VIEW_LOCATIONS, MANAGE_LOCATIONS, MANAGE_CATEGORIES],
    },
];

/// Held by every employee and re-added on each manageable update.
pub const DEFAULT_EMPLOYEE_PERMISSIONS: &[&str] =
    &[VIEW_DASHBOARD, VIEW_POSTS, VIEW_PROJECTS, VIEW_NEWS, VIEW_LOCATIONS];

/// What an administrator may toggle per employee.
pub const MANAGEABLE_EMPLOYEE_PERMISSIONS: &[&str] = &[
    APPROVE_POSTS,
    REJECT_POSTS,
    DELETE_POSTS,
    MANAGE_REPORTS,
    CREATE_PROJECTS,
    EDIT_PROJECTS,
    MANAGE_PRICES,
    CREATE_NEWS,
    EDIT_NEWS,
    DELETE_NEWS,
    VIEW_TRANSACTIONS,
    VIEW_STATISTICS,
    EXPORT_REPORTS,
    VIEW_USERS,
    MANAGE_LOCATIONS,
    MANAGE_CATEGORIES,
];

pub fn all_permissions() -> impl Iterator<Item = &'static str> {
    GROUPS.iter().flat_map(|group| group.permissions.iter().copied())
}

pub fn is_known(token: &str) -> bool {
    all_permissions().any(|known| known == token)
}

pub fn is_default_for_employee(token: &str) -> bool {
    DEFAULT_EMPLOYEE_PERMISSIONS.contains(&token)
}

pub fn is_manageable(token: &str) -> bool {
    MANAGEABLE_EMPLOYEE_PERMISSIONS.contains(&token)
}

pub fn default_employee_grants() -> GrantSet {
    DEFAULT_EMPLOYEE_PERMISSIONS.iter().copied().collect()
}

/// Tokens in `requested` that fall outside the manageable catalogue, sorted
/// and deduplicated.
pub fn invalid_manageable<'a>(requested: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    requested
        .into_iter()
        .filter(|token| !is_manageable(token))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Final grant set for a manageable update: defaults plus the supplied tokens.
/// Callers must have rejected anything [`invalid_manageable`] reports.
pub fn employee_grants<'a>(manageable: impl IntoIterator<Item = &'a str>) -> GrantSet {
    let mut grants = default_employee_grants();
    grants.extend(manageable);
    grants
}

/// An employee's grants split into the default and manageable halves, plus
/// anything that is neither (granted through a full replace).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct EmployeeGrantSplit {
    pub default_permissions: Vec<String>,
    pub manageable_permissions: Vec<String>,
    pub other_permissions: Vec<String>,
}

pub fn split_employee_grants(grants: &GrantSet) -> EmployeeGrantSplit {
    let mut split = EmployeeGrantSplit::default();
    for token in grants.iter() {
        if is_default_for_employee(token) {
            split.default_permissions.push(token.to_string());
        } else if is_manageable(token) {
            split.manageable_permissions.push(token.to_string());
        } else {
            split.other_permissions.push(token.to_string());
        }
    }
    split
}
