/// Hierarchical record visibility
///
/// Which owner-bearing records an actor may see is decided by their role
/// tier and the manager tree:
///
/// | Tier          | Roles                  | Visible owners                        |
/// |---------------|------------------------|---------------------------------------|
/// | Unrestricted  | super_admin, admin     | everyone in the tenant                |
/// | Team          | sales_manager          | self + direct and indirect reports    |
/// | Own           | sales_rep, support     | self                                  |
///
/// [`resolve_scope`] computes a [`Scope`] for the actor; list queries turn
/// it into an `owner = ANY($ids)` predicate via [`Scope::owner_filter`], and
/// point reads/updates/deletes call [`enforce_scope`] after fetching.
///
/// The manager tree is walked breadth-first with a visited set, so a cycle
/// in `manager_id` (which writes reject, but older data may contain)
/// terminates and yields each reachable user exactly once.
///
/// # Example
///
/// ```no_run
/// use salescrm_shared::auth::scope::{enforce_scope, resolve_scope};
/// use salescrm_shared::auth::middleware::AuthContext;
/// use salescrm_shared::models::contact::Contact;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, auth: AuthContext, id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let scope = resolve_scope(&pool, &auth).await?;
/// if let Some(contact) = Contact::find_by_id(&pool, auth.tenant_id, id).await? {
///     enforce_scope(&contact, &scope)?;
/// }
/// # Ok(())
/// # }
/// ```

use std::collections::{HashMap, HashSet, VecDeque};

use sqlx::PgPool;
use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::user::{ManagerEdge, ScopeTier, User};

/// Set of owners whose records an actor may touch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Unrestricted,
    Restricted(HashSet<Uuid>),
}

impl Scope {
    pub fn own(user_id: Uuid) -> Self {
        Scope::Restricted(HashSet::from([user_id]))
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Scope::Unrestricted)
    }

    /// Whether records owned by `owner` are visible; unowned records are
    /// only visible to unrestricted actors
    pub fn allows(&self, owner: Option<Uuid>) -> bool {
        match self {
            Scope::Unrestricted => true,
            Scope::Restricted(ids) => owner.is_some_and(|id| ids.contains(&id)),
        }
    }

    /// Owner ids for an `ANY($n)` predicate; `None` means no filter
    pub fn owner_filter(&self) -> Option<Vec<Uuid>> {
        match self {
            Scope::Unrestricted => None,
            Scope::Restricted(ids) => {
                let mut ids: Vec<Uuid> = ids.iter().copied().collect();
                ids.sort_unstable();
                Some(ids)
            }
        }
    }

    /// Checks that the actor may assign a record to `owner`
    pub fn ensure_assignable(&self, owner: Uuid) -> Result<(), ScopeError> {
        if self.allows(Some(owner)) {
            Ok(())
        } else {
            Err(ScopeError::OwnerOutOfScope(owner))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    /// The record exists but belongs to someone outside the actor's scope
    #[error("Access denied to this {0}")]
    AccessDenied(&'static str),

    /// The actor tried to hand a record to a user outside their scope
    #[error("Cannot assign records to user {0}")]
    OwnerOutOfScope(Uuid),
}

/// An entity with an accountable user
///
/// Implemented by every scoped model; `owner_id` returns whichever column
/// plays the owner role for that entity (`owner_id`, `assigned_to`,
/// `salesperson_id`, ...).
pub trait Owned {
    /// Resource label used in access-denied messages
    const RESOURCE: &'static str;

    fn owner_id(&self) -> Option<Uuid>;
}

/// Rejects access to `entity` when its owner is outside `scope`
///
/// Pure and idempotent: calling it repeatedly yields the same answer.
pub fn enforce_scope<T: Owned>(entity: &T, scope: &Scope) -> Result<(), ScopeError> {
    if scope.allows(entity.owner_id()) {
        Ok(())
    } else {
        Err(ScopeError::AccessDenied(T::RESOURCE))
    }
}

/// `root` plus every user reachable by following reports-to edges downward
pub fn team_members(root: Uuid, edges: &[ManagerEdge]) -> HashSet<Uuid> {
    let mut reports: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for edge in edges {
        if let Some(manager) = edge.manager_id {
            reports.entry(manager).or_default().push(edge.id);
        }
    }

    let mut visited = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);

    while let Some(current) = queue.pop_front() {
        for &report in reports.get(&current).into_iter().flatten() {
            if visited.insert(report) {
                queue.push_back(report);
            }
        }
    }

    visited
}

/// Builds the scope for `tier` from already-loaded edges
pub fn scope_for(user_id: Uuid, tier: ScopeTier, edges: &[ManagerEdge]) -> Scope {
    match tier {
        ScopeTier::Unrestricted => Scope::Unrestricted,
        ScopeTier::Team => Scope::Restricted(team_members(user_id, edges)),
        ScopeTier::Own => Scope::own(user_id),
    }
}

/// Computes the actor's scope, reading the manager tree only for team tiers
pub async fn resolve_scope(pool: &PgPool, auth: &AuthContext) -> Result<Scope, sqlx::Error> {
    let tier = auth.role.scope_tier();

    let edges = match tier {
        ScopeTier::Team => User::manager_edges(pool, auth.tenant_id).await?,
        ScopeTier::Unrestricted | ScopeTier::Own => Vec::new(),
    };

    let scope = scope_for(auth.user_id, tier, &edges);

    if let Scope::Restricted(ids) = &scope {
        tracing::debug!(user_id = %auth.user_id, visible_users = ids.len(), "Resolved restricted scope");
    }

    Ok(scope)
}

/// Whether making `manager_id` the manager of `user_id` would close a loop
///
/// True when `manager_id` is `user_id` itself or one of its (transitive)
/// reports.
pub fn creates_cycle(user_id: Uuid, manager_id: Uuid, edges: &[ManagerEdge]) -> bool {
    team_members(user_id, edges).contains(&manager_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(id: Uuid, manager_id: Option<Uuid>) -> ManagerEdge {
        ManagerEdge { id, manager_id }
    }

    struct Owner(Option<Uuid>);

    impl Owned for Owner {
        const RESOURCE: &'static str = "record";

        fn owner_id(&self) -> Option<Uuid> {
            self.0
        }
    }

    fn ids(list: &[Uuid]) -> HashSet<Uuid> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_admin_tier_is_unrestricted_for_any_tree() {
        let admin = Uuid::new_v4();
        let other = Uuid::new_v4();
        let edges = vec![edge(admin, Some(other)), edge(other, Some(admin))];

        assert_eq!(scope_for(admin, ScopeTier::Unrestricted, &edges), Scope::Unrestricted);
        assert_eq!(scope_for(admin, ScopeTier::Unrestricted, &[]), Scope::Unrestricted);
    }

    #[test]
    fn test_manager_sees_transitive_reports() {
        let (u, a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let outsider = Uuid::new_v4();
        let edges = vec![
            edge(u, None),
            edge(a, Some(u)),
            edge(b, Some(u)),
            edge(c, Some(a)),
            edge(outsider, None),
        ];

        assert_eq!(
            scope_for(u, ScopeTier::Team, &edges),
            Scope::Restricted(ids(&[u, a, b, c]))
        );
    }

    #[test]
    fn test_manager_of_subtree_does_not_see_upward() {
        let (u, a, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let edges = vec![edge(u, None), edge(a, Some(u)), edge(c, Some(a))];

        assert_eq!(scope_for(a, ScopeTier::Team, &edges), Scope::Restricted(ids(&[a, c])));
    }

    #[test]
    fn test_individual_contributor_sees_self_only() {
        let (u, report) = (Uuid::new_v4(), Uuid::new_v4());
        let edges = vec![edge(u, None), edge(report, Some(u))];

        assert_eq!(scope_for(u, ScopeTier::Own, &edges), Scope::Restricted(ids(&[u])));
    }

    #[test]
    fn test_manager_without_reports_sees_self_only() {
        let u = Uuid::new_v4();
        let peer = Uuid::new_v4();
        let edges = vec![edge(u, None), edge(peer, None)];

        assert_eq!(scope_for(u, ScopeTier::Team, &edges), Scope::Restricted(ids(&[u])));
    }

    #[test]
    fn test_cycle_terminates_with_each_node_once() {
        let (u, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        // u -> a -> b -> u
        let edges = vec![edge(a, Some(u)), edge(b, Some(a)), edge(u, Some(b))];

        assert_eq!(team_members(u, &edges), ids(&[u, a, b]));
        assert_eq!(team_members(b, &edges), ids(&[u, a, b]));
    }

    #[test]
    fn test_self_loop_terminates() {
        let u = Uuid::new_v4();
        assert_eq!(team_members(u, &[edge(u, Some(u))]), ids(&[u]));
    }

    #[test]
    fn test_enforce_denies_iff_owner_outside_scope() {
        let (u, a, stranger) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let scope = Scope::Restricted(ids(&[u, a]));

        assert!(enforce_scope(&Owner(Some(u)), &scope).is_ok());
        assert!(enforce_scope(&Owner(Some(a)), &scope).is_ok());
        assert_eq!(
            enforce_scope(&Owner(Some(stranger)), &scope),
            Err(ScopeError::AccessDenied("record"))
        );
        assert!(enforce_scope(&Owner(None), &scope).is_err());
    }

    #[test]
    fn test_enforce_never_denies_unrestricted() {
        assert!(enforce_scope(&Owner(Some(Uuid::new_v4())), &Scope::Unrestricted).is_ok());
        assert!(enforce_scope(&Owner(None), &Scope::Unrestricted).is_ok());
    }

    #[test]
    fn test_enforce_is_idempotent() {
        let scope = Scope::own(Uuid::new_v4());
        let entity = Owner(Some(Uuid::new_v4()));

        let first = enforce_scope(&entity, &scope);
        let second = enforce_scope(&entity, &scope);
        assert_eq!(first, second);
        assert_eq!(scope, scope.clone());
    }

    #[test]
    fn test_owner_filter() {
        assert_eq!(Scope::Unrestricted.owner_filter(), None);

        let u = Uuid::new_v4();
        assert_eq!(Scope::own(u).owner_filter(), Some(vec![u]));
    }

    #[test]
    fn test_ensure_assignable() {
        let (u, other) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(Scope::own(u).ensure_assignable(u).is_ok());
        assert_eq!(
            Scope::own(u).ensure_assignable(other),
            Err(ScopeError::OwnerOutOfScope(other))
        );
        assert!(Scope::Unrestricted.ensure_assignable(other).is_ok());
    }

    #[test]
    fn test_creates_cycle() {
        let (u, a, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let edges = vec![edge(u, None), edge(a, Some(u)), edge(c, Some(a))];

        assert!(creates_cycle(u, c, &edges));
        assert!(creates_cycle(u, u, &edges));
        assert!(!creates_cycle(c, u, &edges));
        assert!(!creates_cycle(a, Uuid::new_v4(), &edges));
    }
}
