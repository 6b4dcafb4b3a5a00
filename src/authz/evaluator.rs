use std::future::Future;

use uuid::Uuid;

use super::{MatchMode, Role};
use crate::errors::AppResult;
use crate::models::permission::GrantSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Denied, with a reason that names the policy that rejected the request.
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Decide whether `role` holding `grants` may do what `required` names.
///
/// Evaluation order:
/// 1. admin -> allow, grants are not inspected
/// 2. nothing required -> allow
/// 3. ALL: every token held / ANY: at least one token held -> allow
/// 4. deny
///
/// Role `user` is not special-cased; it fails the membership check because
/// it holds no grants.
pub fn evaluate<S: AsRef<str>>(role: Role, grants: &GrantSet, required: &[S], mode: MatchMode) -> Decision {
    if role == Role::Admin {
        tracing::debug!(%role, "admin bypass");
        return Decision::Allow;
    }

    if required.is_empty() {
        return Decision::Allow;
    }

    let held = |token: &&S| grants.contains(token.as_ref());

    match mode {
        MatchMode::All => {
            let missing: Vec<&str> = required.iter().filter(|t| !held(t)).map(|t| t.as_ref()).collect();
            if missing.is_empty() {
                tracing::debug!(%role, "all required permissions held");
                Decision::Allow
            } else {
                tracing::debug!(%role, missing = ?missing, "permission denied (all)");
                Decision::Deny(format!("missing required permissions: {}", missing.join(", ")))
            }
        }
        MatchMode::Any => {
            if required.iter().any(|t| held(&t)) {
                tracing::debug!(%role, "one of the required permissions held");
                Decision::Allow
            } else {
                let wanted: Vec<&str> = required.iter().map(|t| t.as_ref()).collect();
                tracing::debug!(%role, required = ?wanted, "permission denied (any)");
                Decision::Deny(format!("requires at least one of: {}", wanted.join(", ")))
            }
        }
    }
}

/// [`evaluate`] with a lazily loaded grant set. `load_grants` only runs when
/// the decision actually depends on grants, so admins never touch the store.
pub async fn authorize<S, F, Fut>(role: Role, required: &[S], mode: MatchMode, load_grants: F) -> AppResult<Decision>
where
    S: AsRef<str>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = AppResult<GrantSet>>,
{
    if role == Role::Admin || required.is_empty() {
        return Ok(evaluate(role, &GrantSet::new(), required, mode));
    }

    let grants = load_grants().await?;
    Ok(evaluate(role, &grants, required, mode))
}

/// Grants are readable by admins and by their owner.
pub fn can_view_grants_of(actor_role: Role, actor_id: Uuid, target_id: Uuid) -> bool {
    actor_role == Role::Admin || actor_id == target_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    fn grants(tokens: &[&str]) -> GrantSet {
        tokens.iter().copied().collect()
    }

    const NOTHING: [&str; 0] = [];

    #[test]
    fn admin_bypasses_every_check() {
        let required = ["view_statistics", "edit_settings"];
        for mode in [MatchMode::All, MatchMode::Any] {
            assert_eq!(evaluate(Role::Admin, &GrantSet::new(), &required, mode), Decision::Allow);
            assert_eq!(evaluate(Role::Admin, &grants(&["unrelated"]), &required, mode), Decision::Allow);
            assert_eq!(evaluate(Role::Admin, &GrantSet::new(), &NOTHING, mode), Decision::Allow);
        }
    }

    #[test]
    fn empty_requirement_allows_everyone() {
        for role in [Role::User, Role::Employee, Role::Admin] {
            for mode in [MatchMode::All, MatchMode::Any] {
                assert!(evaluate(role, &GrantSet::new(), &NOTHING, mode).is_allowed());
            }
        }
    }

    #[test]
    fn all_mode_requires_subset() {
        let held = grants(&["view_dashboard", "view_statistics", "manage_prices"]);
        assert!(evaluate(Role::Employee, &held, &["view_dashboard", "view_statistics"], MatchMode::All).is_allowed());
        assert!(!evaluate(Role::Employee, &held, &["view_dashboard", "edit_settings"], MatchMode::All).is_allowed());
    }

    #[test]
    fn any_mode_requires_intersection() {
        let held = grants(&["view_dashboard"]);
        assert!(evaluate(Role::Employee, &held, &["view_dashboard", "view_statistics"], MatchMode::Any).is_allowed());
        assert!(!evaluate(Role::Employee, &held, &["edit_settings", "view_statistics"], MatchMode::Any).is_allowed());
    }

    #[test]
    fn deny_reason_differs_by_mode() {
        let held = grants(&["view_dashboard"]);
        let required = ["view_statistics", "export_reports"];
        let Decision::Deny(all) = evaluate(Role::Employee, &held, &required, MatchMode::All) else {
            panic!("expected denial");
        };
        let Decision::Deny(any) = evaluate(Role::Employee, &held, &required, MatchMode::Any) else {
            panic!("expected denial");
        };
        assert_ne!(all, any);
        assert!(all.contains("view_statistics"));
        assert!(any.contains("at least one"));
    }

    #[test]
    fn all_mode_reason_lists_only_missing_tokens() {
        let held = grants(&["view_dashboard"]);
        let decision = evaluate(Role::Employee, &held, &["view_dashboard", "view_statistics"], MatchMode::All);
        assert_eq!(decision, Decision::Deny("missing required permissions: view_statistics".to_string()));
    }

    #[test]
    fn user_role_is_judged_by_grants_alone() {
        assert!(!evaluate(Role::User, &GrantSet::new(), &["view_dashboard"], MatchMode::Any).is_allowed());
    }

    #[tokio::test]
    async fn authorize_skips_grant_load_for_admin() {
        let decision = authorize(Role::Admin, &["view_statistics"], MatchMode::All, || async {
            if true {
                panic!("grant store must not be read for admins");
            }
            Ok::<_, AppError>(GrantSet::new())
        })
        .await
        .unwrap();
        assert_eq!(decision, Decision::Allow);
    }

    #[tokio::test]
    async fn authorize_loads_grants_for_employee() {
        let decision = authorize(Role::Employee, &["view_statistics"], MatchMode::All, || async {
            Ok::<_, AppError>(grants(&["view_statistics"]))
        })
        .await
        .unwrap();
        assert!(decision.is_allowed());

        let decision = authorize(Role::Employee, &["view_statistics"], MatchMode::All, || async {
            Ok::<_, AppError>(GrantSet::new())
        })
        .await
        .unwrap();
        assert!(!decision.is_allowed());
    }

    #[test]
    fn grants_visible_to_admin_and_owner_only() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(can_view_grants_of(Role::Admin, me, other));
        assert!(can_view_grants_of(Role::Employee, me, me));
        assert!(!can_view_grants_of(Role::Employee, me, other));
        assert!(!can_view_grants_of(Role::User, me, other));
    }
}
