//! Department-scoped visibility against stored users

mod common;

use backoffice::service::access::{self, AccessScope};
use tokio_test::assert_ok;

#[tokio::test]
async fn descendant_cannot_see_ancestor_records() {
    let (state, admin) = common::setup().await;
    let sales = common::department(&state, "Sales", None).await;
    let east = common::department(&state, "East", Some(sales.id)).await;
    let manager = common::member(&state, &admin, "manager", Some(sales.id)).await;
    let clerk = common::member(&state, &admin, "clerk", Some(east.id)).await;

    assert!(!access::has_access_to_record(&common::actor(&clerk), Some(&manager)));
    assert!(access::has_access_to_record(&common::actor(&manager), Some(&clerk)));
    assert!(access::has_access_to_record(&common::actor(&admin), Some(&clerk)));
}

#[tokio::test]
async fn accessible_ids_follow_the_subtree() {
    let (state, admin) = common::setup().await;
    let sales = common::department(&state, "Sales", None).await;
    let east = common::department(&state, "East", Some(sales.id)).await;
    let lookalike = common::department(&state, "Sales-Global", None).await;
    let manager = common::member(&state, &admin, "manager", Some(sales.id)).await;
    let clerk = common::member(&state, &admin, "clerk", Some(east.id)).await;
    let stranger = common::member(&state, &admin, "stranger", Some(lookalike.id)).await;
    let loner = common::member(&state, &admin, "loner", None).await;

    let ids = assert_ok!(access::accessible_user_ids(&state.db, &common::actor(&manager)).await);
    assert_eq!(ids, vec![manager.id, clerk.id]);

    let ids = assert_ok!(access::accessible_user_ids(&state.db, &common::actor(&clerk)).await);
    assert_eq!(ids, vec![clerk.id]);

    let ids = assert_ok!(access::accessible_user_ids(&state.db, &common::actor(&loner)).await);
    assert_eq!(ids, vec![loner.id]);

    let ids = assert_ok!(access::accessible_user_ids(&state.db, &common::actor(&admin)).await);
    assert_eq!(ids.len(), 5);
    assert!(ids.contains(&stranger.id));

    let depts =
        assert_ok!(access::accessible_department_ids(&state.db, &common::actor(&manager)).await);
    assert_eq!(depts, vec![sales.id, east.id]);

    let scope =
        assert_ok!(access::build_accessible_user_query(&state.db, &common::actor(&admin)).await);
    assert_eq!(scope, AccessScope::All);
    let scope =
        assert_ok!(access::build_accessible_user_query(&state.db, &common::actor(&clerk)).await);
    assert!(scope.allows(clerk.id));
    assert!(!scope.allows(manager.id));
}
