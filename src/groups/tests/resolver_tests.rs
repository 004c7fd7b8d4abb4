//! End-to-end resolver scenarios through the public facade

use groups_authz::{
    Authz, AuthzConfig, AuthzError, CacheBackend, CacheConfig, GroupId, GroupUpdate, InMemoryStorage, OrphanPolicy,
    Principal, Storage, SuperRole,
};
use std::sync::Arc;
use std::time::Duration;

/// Fruits -> { Sweet -> { Banana }, Sour -> { Lemon } }
/// Fruits holds "dance", Sour holds "sing"
struct Fruits {
    authz: Authz,
    fruits: GroupId,
    sweet: GroupId,
    banana: GroupId,
    sour: GroupId,
    lemon: GroupId,
    dance: i64,
    sing: i64,
}

async fn fruits(config: AuthzConfig) -> Fruits {
    let authz = Authz::in_memory(config);
    let groups = authz.groups();

    let fruits = groups.create("Fruits", None).await.unwrap();
    let sweet = groups.create("Sweet", Some(fruits)).await.unwrap();
    let banana = groups.create("Banana", Some(sweet)).await.unwrap();
    let sour = groups.create("Sour", Some(fruits)).await.unwrap();
    let lemon = groups.create("Lemon", Some(sour)).await.unwrap();

    let dance = authz.capabilities().create("dance").await.unwrap();
    let sing = authz.capabilities().create("sing").await.unwrap();
    authz.grants().add_group_capability(fruits, dance).await.unwrap();
    authz.grants().add_group_capability(sour, sing).await.unwrap();

    Fruits {
        authz,
        fruits,
        sweet,
        banana,
        sour,
        lemon,
        dance,
        sing,
    }
}

#[tokio::test]
async fn test_fruits_scenario() {
    let f = fruits(AuthzConfig::default()).await;

    for group in [f.fruits, f.sweet, f.banana, f.sour, f.lemon] {
        assert!(f.authz.can(&Principal::Group(group), "dance").await.unwrap());
    }

    let sing: Vec<_> = [f.fruits, f.sweet, f.banana, f.sour, f.lemon]
        .into_iter()
        .map(Principal::Group)
        .collect();
    let mut holders = Vec::new();
    for principal in &sing {
        if f.authz.can(principal, "sing").await.unwrap() {
            holders.push(principal.id());
        }
    }
    assert_eq!(holders, vec![f.sour, f.lemon]);
}

#[tokio::test]
async fn test_user_in_banana() {
    let f = fruits(AuthzConfig::default()).await;
    f.authz.grants().add_member(1, f.banana).await.unwrap();

    let user = Principal::User(1);
    assert!(f.authz.can(&user, "dance").await.unwrap());
    assert!(f.authz.can(&user, f.dance).await.unwrap());
    assert!(!f.authz.can(&user, "sing").await.unwrap());

    let groups: Vec<_> = f.authz.resolver().group_ids(&user).await.unwrap().iter().copied().collect();
    assert_eq!(groups, vec![f.fruits, f.sweet, f.banana]);

    let labels: Vec<_> = f
        .authz
        .effective_capabilities(&user)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.label)
        .collect();
    assert_eq!(labels, vec!["dance".to_string()]);
}

#[tokio::test]
async fn test_direct_grant_without_membership() {
    let f = fruits(AuthzConfig::default()).await;
    f.authz.grants().add_user_capability(2, f.sing).await.unwrap();

    assert!(f.authz.can(&Principal::User(2), "sing").await.unwrap());
    assert!(!f.authz.can(&Principal::User(2), "dance").await.unwrap());
}

#[tokio::test]
async fn test_user_without_grants() {
    let f = fruits(AuthzConfig::default()).await;
    let user = Principal::User(99);

    assert!(!f.authz.can(&user, "dance").await.unwrap());
    assert!(!f.authz.can(&user, None::<&str>).await.unwrap());
    assert!(!f.authz.can(&user, "no-such-capability").await.unwrap());
    assert!(f.authz.effective_capabilities(&user).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_capability_delete_reaches_cached_sets() {
    let f = fruits(AuthzConfig::default()).await;
    f.authz.grants().add_member(1, f.lemon).await.unwrap();
    f.authz.grants().add_user_capability(2, f.sing).await.unwrap();

    // Warm the cache
    assert!(f.authz.can(&Principal::User(1), "sing").await.unwrap());
    assert!(f.authz.can(&Principal::User(2), "sing").await.unwrap());
    assert!(f.authz.can(&Principal::Group(f.lemon), "sing").await.unwrap());

    f.authz.capabilities().delete(f.sing).await.unwrap();

    assert!(!f.authz.can(&Principal::User(1), "sing").await.unwrap());
    assert!(!f.authz.can(&Principal::User(2), f.sing).await.unwrap());
    assert!(!f.authz.can(&Principal::Group(f.lemon), "sing").await.unwrap());
    assert!(f.authz.can(&Principal::User(1), "dance").await.unwrap());
}

#[tokio::test]
async fn test_group_delete_clears_to_root() {
    let f = fruits(AuthzConfig::default()).await;
    f.authz.grants().add_member(1, f.sour).await.unwrap();
    f.authz.grants().add_member(2, f.lemon).await.unwrap();
    assert!(f.authz.can(&Principal::User(2), "sing").await.unwrap());

    f.authz.groups().delete(f.sour).await.unwrap();

    assert!(!f.authz.grants().is_member(1, f.sour).await.unwrap());
    assert!(f.authz.resolver().group_ids(&Principal::User(1)).await.unwrap().is_empty());

    // Lemon is now a root: nothing inherited
    let lemon = f.authz.groups().read(f.lemon).await.unwrap().unwrap();
    assert_eq!(lemon.parent_id, None);
    assert!(!f.authz.can(&Principal::User(2), "sing").await.unwrap());
    assert!(!f.authz.can(&Principal::User(2), "dance").await.unwrap());
}

#[tokio::test]
async fn test_group_delete_reassigns_to_grandparent() {
    let config = AuthzConfig::default().with_orphan_policy(OrphanPolicy::ReassignToGrandparent);
    let f = fruits(config).await;
    f.authz.grants().add_member(2, f.lemon).await.unwrap();
    assert!(f.authz.can(&Principal::User(2), "sing").await.unwrap());

    f.authz.groups().delete(f.sour).await.unwrap();

    let lemon = f.authz.groups().read(f.lemon).await.unwrap().unwrap();
    assert_eq!(lemon.parent_id, Some(f.fruits));
    assert!(!f.authz.can(&Principal::User(2), "sing").await.unwrap());
    assert!(f.authz.can(&Principal::User(2), "dance").await.unwrap());
}

#[tokio::test]
async fn test_group_grant_invalidates_descendant_members() {
    let f = fruits(AuthzConfig::default()).await;
    let fly = f.authz.capabilities().create("fly").await.unwrap();
    f.authz.grants().add_member(1, f.banana).await.unwrap();

    assert!(!f.authz.can(&Principal::User(1), "fly").await.unwrap());
    assert!(!f.authz.can(&Principal::Group(f.banana), "fly").await.unwrap());

    f.authz.grants().add_group_capability(f.fruits, fly).await.unwrap();
    assert!(f.authz.can(&Principal::User(1), "fly").await.unwrap());
    assert!(f.authz.can(&Principal::Group(f.banana), "fly").await.unwrap());

    f.authz.grants().remove_group_capability(f.fruits, fly).await.unwrap();
    assert!(!f.authz.can(&Principal::User(1), "fly").await.unwrap());
}

#[tokio::test]
async fn test_reparent_moves_inheritance() {
    let f = fruits(AuthzConfig::default()).await;
    f.authz.grants().add_member(1, f.banana).await.unwrap();
    assert!(!f.authz.can(&Principal::User(1), "sing").await.unwrap());

    f.authz
        .groups()
        .update(f.banana, GroupUpdate::default().parent(Some(f.sour)))
        .await
        .unwrap();
    assert!(f.authz.can(&Principal::User(1), "sing").await.unwrap());

    let err = f
        .authz
        .groups()
        .update(f.fruits, GroupUpdate::default().parent(Some(f.banana)))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::InvalidParent { .. }));
}

#[tokio::test]
async fn test_create_validation() {
    let authz = Authz::in_memory(AuthzConfig::default());
    assert!(matches!(authz.groups().create("", None).await, Err(AuthzError::EmptyName)));
    assert!(matches!(
        authz.groups().create("Fruits", Some(-1)).await,
        Err(AuthzError::InvalidParent { parent: -1, .. })
    ));
    assert!(matches!(authz.capabilities().create(" ").await, Err(AuthzError::EmptyLabel)));

    authz.capabilities().create("dance").await.unwrap();
    assert!(matches!(
        authz.capabilities().create("dance").await,
        Err(AuthzError::DuplicateLabel(_))
    ));
}

#[tokio::test]
async fn test_admin_override() {
    let admins: Arc<dyn SuperRole> = Arc::new(|p: &Principal| *p == Principal::User(1));
    let f = fruits(AuthzConfig::default().with_admin_override(true)).await;
    let authz = f.authz.with_super_role(admins);

    assert!(authz.can(&Principal::User(1), "sing").await.unwrap());
    assert!(authz.can(&Principal::User(1), "undefined-capability").await.unwrap());
    assert!(!authz.can(&Principal::User(2), "sing").await.unwrap());
}

#[tokio::test]
async fn test_lru_backend() {
    let config = AuthzConfig::default().with_cache(CacheConfig {
        backend: CacheBackend::Lru,
        capacity: 3,
    });
    let f = fruits(config).await;
    f.authz.grants().add_member(1, f.banana).await.unwrap();
    f.authz.grants().add_member(2, f.lemon).await.unwrap();

    // Each principal takes three entries; the second pushes out the first
    assert!(f.authz.can(&Principal::User(1), "dance").await.unwrap());
    assert!(f.authz.can(&Principal::User(2), "sing").await.unwrap());
    assert_eq!(f.authz.cache_stats().capacity, Some(3));
    assert_eq!(f.authz.cache_stats().entries, 3);

    // Evicted entries are simply recomputed
    assert!(f.authz.can(&Principal::User(1), "dance").await.unwrap());
    assert!(!f.authz.can(&Principal::User(1), "sing").await.unwrap());
}

#[tokio::test]
async fn test_metrics_track_cache_and_checks() {
    let f = fruits(AuthzConfig::default()).await;
    f.authz.grants().add_member(1, f.banana).await.unwrap();

    f.authz.can(&Principal::User(1), "dance").await.unwrap();
    f.authz.can(&Principal::User(1), "sing").await.unwrap();

    let metrics = f.authz.metrics().unwrap();
    assert_eq!(metrics.total_checks, 2);
    assert_eq!(metrics.allowed_checks, 1);
    assert_eq!(metrics.cache_misses, 1);
    assert_eq!(metrics.cache_hits, 1);
}

#[tokio::test]
async fn test_checks_terminate_on_cyclic_parent_links() {
    let storage = Arc::new(InMemoryStorage::new());
    let authz = Authz::new(AuthzConfig::default(), storage.clone());

    let a = authz.groups().create("a", None).await.unwrap();
    let b = authz.groups().create("b", Some(a)).await.unwrap();
    let c = authz.groups().create("c", Some(b)).await.unwrap();
    let dance = authz.capabilities().create("dance").await.unwrap();
    authz.grants().add_group_capability(a, dance).await.unwrap();
    authz.grants().add_member(1, c).await.unwrap();

    // Bypass the store's cycle check: a -> c -> b -> a
    let mut corrupt = storage.group(a).await.unwrap().unwrap();
    corrupt.parent_id = Some(c);
    assert!(storage.update_group(&corrupt).await.unwrap());
    authz.flush_cache();

    let user = Principal::User(1);
    let allowed = tokio::time::timeout(Duration::from_secs(5), authz.can(&user, "dance"))
        .await
        .expect("check did not terminate")
        .unwrap();
    assert!(allowed);
    assert!(authz.can(&Principal::Group(c), "dance").await.unwrap());
    assert!(!authz.can(&user, "sing").await.unwrap());

    let closure: Vec<_> = authz.resolver().group_ids(&user).await.unwrap().iter().copied().collect();
    assert_eq!(closure, vec![a, b, c]);

    // Each group is visited once, well within the group-count bound
    assert_eq!(authz.metrics().unwrap().truncated_walks, 0);

    // Group writes walk descendants over the same cycle
    let sing = authz.capabilities().create("sing").await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), authz.grants().add_group_capability(b, sing))
        .await
        .expect("invalidation did not terminate")
        .unwrap();
    assert!(authz.can(&user, "sing").await.unwrap());
}
