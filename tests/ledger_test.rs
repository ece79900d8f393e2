//! Team account ledger: funding, recharge, verification and concurrency

mod common;

use backoffice::entity::account_record::{self, RecordStatus, RecordType};
use backoffice::entity::finance::{self, ApprovalStatus};
use backoffice::error::AppError;
use backoffice::money;
use backoffice::service::ledger::{CreateTeamAccount, Recharge, RecordQuery, UpdateTeamAccount};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use tokio_test::{assert_err, assert_ok};

async fn records_of(state: &backoffice::AppState, account_id: i64) -> Vec<account_record::Model> {
    account_record::Entity::find()
        .filter(account_record::Column::TeamAccountId.eq(account_id))
        .order_by_asc(account_record::Column::Id)
        .all(&state.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn initial_balance_and_recharge() {
    let (state, admin) = common::setup().await;
    let dept = common::department(&state, "Sales", None).await;
    let account = common::account(&state, &admin, dept.id, dec!(1000)).await;
    assert_eq!(account.balance_amount(), dec!(1000));

    let records = records_of(&state, account.id).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, RecordType::Income);
    assert_eq!(records[0].balance_before, 0);
    assert_eq!(money::from_cents(records[0].balance_after), dec!(1000));

    // The funding is backed by an approved income entry
    let funding = finance::Entity::find_by_id(records[0].finance_id.unwrap())
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(funding.approval_status, ApprovalStatus::Approved);

    let posted = assert_ok!(
        state
            .ledger()
            .recharge(
                &common::actor(&admin),
                account.id,
                Recharge {
                    amount: dec!(500),
                    description: None,
                },
            )
            .await
    );
    assert_eq!(posted.account.balance_amount(), dec!(1500));
    assert_eq!(posted.record.kind, RecordType::Recharge);
    assert_eq!(money::from_cents(posted.record.balance_before), dec!(1000));
    assert_eq!(money::from_cents(posted.record.balance_after), dec!(1500));

    let check = state
        .ledger()
        .verify(&common::actor(&admin), account.id)
        .await
        .unwrap();
    assert!(check.consistent);
    assert!(check.records_balanced);
    assert_eq!(check.total_in, dec!(1500));
}

#[tokio::test]
async fn recharge_limits() {
    let (state, admin) = common::setup().await;
    let dept = common::department(&state, "Sales", None).await;
    let account = common::account(&state, &admin, dept.id, dec!(0)).await;
    let ledger = state.ledger();
    let actor = common::actor(&admin);

    let err = assert_err!(
        ledger
            .recharge(&actor, account.id, Recharge { amount: dec!(0), description: None })
            .await
    );
    assert!(matches!(err, AppError::Validation(_)));

    let err = assert_err!(
        ledger
            .recharge(
                &actor,
                account.id,
                Recharge {
                    amount: dec!(1000000.01),
                    description: None,
                },
            )
            .await
    );
    assert!(matches!(err, AppError::InvalidState(_)));

    ledger
        .update_account(
            &actor,
            account.id,
            UpdateTeamAccount {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let err = assert_err!(
        ledger
            .recharge(&actor, account.id, Recharge { amount: dec!(10), description: None })
            .await
    );
    assert!(matches!(err, AppError::InvalidState(_)));
    assert!(records_of(&state, account.id).await.is_empty());
}

#[tokio::test]
async fn one_account_per_department() {
    let (state, admin) = common::setup().await;
    let dept = common::department(&state, "Sales", None).await;
    common::account(&state, &admin, dept.id, dec!(0)).await;

    let err = assert_err!(
        state
            .ledger()
            .create_account(
                &common::actor(&admin),
                CreateTeamAccount {
                    name: "Second".to_string(),
                    department_id: dept.id,
                    initial_balance: dec!(5),
                    description: None,
                },
            )
            .await
    );
    assert!(matches!(err, AppError::Conflict(_)));

    let err = assert_err!(
        state
            .ledger()
            .create_account(
                &common::actor(&admin),
                CreateTeamAccount {
                    name: "Ghost".to_string(),
                    department_id: 999,
                    initial_balance: dec!(0),
                    description: None,
                },
            )
            .await
    );
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn balance_cannot_be_set_directly() {
    let (state, admin) = common::setup().await;
    let dept = common::department(&state, "Sales", None).await;
    let account = common::account(&state, &admin, dept.id, dec!(100)).await;

    let err = assert_err!(
        state
            .ledger()
            .update_account(
                &common::actor(&admin),
                account.id,
                UpdateTeamAccount {
                    balance: Some(dec!(1000000)),
                    ..Default::default()
                },
            )
            .await
    );
    assert!(matches!(err, AppError::Validation(_)));

    let account = state
        .ledger()
        .get_account(&common::actor(&admin), account.id)
        .await
        .unwrap();
    assert_eq!(account.balance_amount(), dec!(100));
}

#[tokio::test]
async fn accounts_with_history_are_kept() {
    let (state, admin) = common::setup().await;
    let sales = common::department(&state, "Sales", None).await;
    let support = common::department(&state, "Support", None).await;
    let funded = common::account(&state, &admin, sales.id, dec!(10)).await;
    let empty = common::account(&state, &admin, support.id, dec!(0)).await;
    let actor = common::actor(&admin);

    let err = assert_err!(state.ledger().delete_account(&actor, funded.id).await);
    assert!(matches!(err, AppError::Conflict(_)));
    assert_ok!(state.ledger().delete_account(&actor, empty.id).await);
}

#[tokio::test]
async fn records_are_paged_and_filtered() {
    let (state, admin) = common::setup().await;
    let dept = common::department(&state, "Sales", None).await;
    let account = common::account(&state, &admin, dept.id, dec!(1)).await;
    let actor = common::actor(&admin);
    for _ in 0..4 {
        state
            .ledger()
            .recharge(&actor, account.id, Recharge { amount: dec!(2.5), description: None })
            .await
            .unwrap();
    }

    let page = state
        .ledger()
        .list_records(
            &actor,
            account.id,
            RecordQuery {
                page: Some(1),
                page_size: Some(3),
                kind: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 3);
    // Newest first
    assert_eq!(money::from_cents(page.items[0].balance_after), dec!(11));

    let recharges = state
        .ledger()
        .list_records(
            &actor,
            account.id,
            RecordQuery {
                kind: Some(RecordType::Recharge),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(recharges.total, 4);
}

#[tokio::test]
async fn accounts_outside_scope_are_hidden() {
    let (state, admin) = common::setup().await;
    let sales = common::department(&state, "Sales", None).await;
    let east = common::department(&state, "East", Some(sales.id)).await;
    let sales_account = common::account(&state, &admin, sales.id, dec!(0)).await;
    let east_account = common::account(&state, &admin, east.id, dec!(0)).await;
    let clerk = common::member(&state, &admin, "clerk", Some(east.id)).await;
    let manager = common::member(&state, &admin, "manager", Some(sales.id)).await;

    let visible = state.ledger().list_accounts(&common::actor(&clerk)).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, east_account.id);

    let visible = state.ledger().list_accounts(&common::actor(&manager)).await.unwrap();
    assert_eq!(visible.len(), 2);

    let err = assert_err!(
        state
            .ledger()
            .get_account(&common::actor(&clerk), sales_account.id)
            .await
    );
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn concurrent_recharges_keep_identity() {
    let (state, admin) = common::setup().await;
    let dept = common::department(&state, "Sales", None).await;
    let account_id = common::account(&state, &admin, dept.id, dec!(100)).await.id;

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let ledger = state.ledger();
        let actor = common::actor(&admin);
        tasks.push(tokio::spawn(async move {
            ledger
                .recharge(&actor, account_id, Recharge { amount: dec!(0.1), description: None })
                .await
        }));
    }
    for task in tasks {
        assert_ok!(task.await.unwrap());
    }

    let check = state
        .ledger()
        .verify(&common::actor(&admin), account_id)
        .await
        .unwrap();
    assert_eq!(check.balance, dec!(101));
    assert!(check.consistent);
    assert!(check.records_balanced);

    let records = records_of(&state, account_id).await;
    assert_eq!(records.len(), 11);
    for pair in records.windows(2) {
        assert_eq!(pair[0].balance_after, pair[1].balance_before);
    }
    assert!(records.iter().all(|r| r.status == RecordStatus::Completed));
}
