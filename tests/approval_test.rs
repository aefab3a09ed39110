mod common;

use anyhow::Result;
use common::{ALICE, BOB, admin, balance_of, log_len, test_service, user};
use guildbank::application::AppError;
use guildbank::domain::{Currency, TransactionStatus};

fn ids(values: &[i64]) -> Vec<String> {
    values.iter().map(|id| id.to_string()).collect()
}

#[tokio::test]
async fn test_pending_batch_leaves_balances_untouched() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let created = service
        .request_deposits(&user(ALICE), "AP,SP", "50,30", Some("event"))
        .await?;

    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|tx| tx.status == Some(TransactionStatus::Pending)));
    assert!(created.iter().all(|tx| tx.reason == "event"));
    assert_eq!(created[0].timestamp, created[1].timestamp);
    assert_eq!(created[0].currency, Currency::Ap);
    assert_eq!(created[1].currency, Currency::Sp);

    assert_eq!(balance_of(&service, ALICE, "AP").await?, 0);
    assert_eq!(balance_of(&service, ALICE, "SP").await?, 0);

    let pending = service.pending_deposits(&admin()).await?;
    assert_eq!(pending.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_pending_batch_length_mismatch() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = service
        .request_deposits(&user(ALICE), "AP,SP,YEN", "50,30", None)
        .await;
    assert!(matches!(
        result,
        Err(AppError::MismatchedBatchLengths {
            currencies: 3,
            amounts: 2
        })
    ));
    assert_eq!(log_len(&service, ALICE).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_pending_batch_is_all_or_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = service
        .request_deposits(&user(ALICE), "AP,SP", "50,lots", None)
        .await;
    assert!(matches!(result, Err(AppError::InvalidAmount(ref msg)) if msg.contains("lots")));

    let result = service
        .request_deposits(&user(ALICE), "AP,GOLD", "50,30", None)
        .await;
    assert!(matches!(result, Err(AppError::InvalidCurrency(_))));

    assert!(service.pending_deposits(&admin()).await?.is_empty());
    assert_eq!(log_len(&service, ALICE).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_approve_by_id_credits_once() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let created = service
        .request_deposits(&user(ALICE), "AP", "40", Some("raid"))
        .await?;
    let id = created[0].id;

    let outcome = service.resolve_pending(&admin(), &ids(&[id]), true).await?;
    assert!(outcome.is_complete());
    assert_eq!(outcome.succeeded.len(), 1);
    assert_eq!(outcome.succeeded[0].new_balance, Some(40));
    assert_eq!(
        outcome.succeeded[0].transaction.status,
        Some(TransactionStatus::Approved)
    );
    assert_eq!(balance_of(&service, ALICE, "AP").await?, 40);

    // Second approval finds nothing pending
    let outcome = service.resolve_pending(&admin(), &ids(&[id]), true).await?;
    assert!(outcome.succeeded.is_empty());
    assert_eq!(outcome.failed.len(), 1);
    assert!(matches!(
        outcome.failed[0].error,
        AppError::NoSuchPendingTransaction(_)
    ));
    assert_eq!(balance_of(&service, ALICE, "AP").await?, 40);

    assert!(service.pending_deposits(&admin()).await?.is_empty());
    let report = service.check_integrity().await?;
    assert!(report.is_healthy(), "issues: {:?}", report.issues);

    Ok(())
}

#[tokio::test]
async fn test_deny_by_id_changes_no_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let created = service
        .request_deposits(&user(ALICE), "YEN", "900", None)
        .await?;

    let outcome = service
        .resolve_pending(&admin(), &ids(&[created[0].id]), false)
        .await?;
    assert_eq!(outcome.succeeded.len(), 1);
    assert_eq!(outcome.succeeded[0].new_balance, None);
    assert_eq!(
        outcome.succeeded[0].transaction.status,
        Some(TransactionStatus::Denied)
    );
    assert_eq!(balance_of(&service, ALICE, "YEN").await?, 0);

    // Denied is terminal
    let outcome = service
        .resolve_pending(&admin(), &ids(&[created[0].id]), true)
        .await?;
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(balance_of(&service, ALICE, "YEN").await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_approve_batch_reports_per_item() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let created = service
        .request_deposits(&user(ALICE), "AP,SP", "10,20", None)
        .await?;
    let direct = service.deposit(&user(BOB), "AP", 5, None).await?;

    let request = vec![
        created[0].id.to_string(),
        "abc".to_string(),
        "9999".to_string(),
        direct.transaction_id.to_string(),
        created[1].id.to_string(),
    ];
    let outcome = service.resolve_pending(&admin(), &request, true).await?;

    assert_eq!(outcome.succeeded.len(), 2);
    assert_eq!(outcome.failed.len(), 3);
    assert!(matches!(outcome.failed[0].error, AppError::InvalidAmount(_)));
    assert_eq!(outcome.failed[0].item, "abc");
    assert!(matches!(
        outcome.failed[1].error,
        AppError::NoSuchPendingTransaction(_)
    ));
    // A direct deposit has no status and cannot be approved
    assert!(matches!(
        outcome.failed[2].error,
        AppError::NoSuchPendingTransaction(_)
    ));

    assert_eq!(balance_of(&service, ALICE, "AP").await?, 10);
    assert_eq!(balance_of(&service, ALICE, "SP").await?, 20);
    assert_eq!(balance_of(&service, BOB, "AP").await?, 5);

    Ok(())
}

#[tokio::test]
async fn test_resolve_requires_admin() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let created = service
        .request_deposits(&user(ALICE), "AP", "10", None)
        .await?;

    let result = service
        .resolve_pending(&user(ALICE), &ids(&[created[0].id]), true)
        .await;
    assert!(matches!(result, Err(AppError::PermissionDenied(ALICE))));
    assert_eq!(service.pending_deposits(&admin()).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_approve_by_reason_sums_per_currency() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service
        .request_deposit(&user(ALICE), "AP", 10, Some("tournament"))
        .await?;
    service
        .request_deposit(&user(ALICE), "AP", 15, Some("tournament"))
        .await?;
    service
        .request_deposit(&user(ALICE), "YEN", 1000, Some("tournament"))
        .await?;
    service
        .request_deposit(&user(ALICE), "SP", 7, Some("other"))
        .await?;

    // Requests do not move balances
    assert_eq!(balance_of(&service, ALICE, "AP").await?, 0);

    let resolution = service
        .approve_requests(&admin(), ALICE, "tournament")
        .await?;
    assert_eq!(resolution.resolved.len(), 3);
    assert_eq!(
        resolution.credited,
        vec![(Currency::Ap, 25), (Currency::Yen, 1000)]
    );
    assert!(
        resolution
            .resolved
            .iter()
            .all(|tx| tx.status == Some(TransactionStatus::Approved))
    );
    let notice = resolution.notice.expect("approval notifies the user");
    assert_eq!(notice.user_id, ALICE);
    assert!(notice.message.contains("tournament"));

    assert_eq!(balance_of(&service, ALICE, "AP").await?, 25);
    assert_eq!(balance_of(&service, ALICE, "YEN").await?, 1000);
    assert_eq!(balance_of(&service, ALICE, "SP").await?, 0);

    // Already approved rows do not match again
    let again = service
        .approve_requests(&admin(), ALICE, "tournament")
        .await?;
    assert!(again.is_empty());
    assert!(again.notice.is_none());
    assert_eq!(balance_of(&service, ALICE, "AP").await?, 25);

    let report = service.check_integrity().await?;
    assert!(report.is_healthy(), "issues: {:?}", report.issues);
    assert_eq!(report.open_request_count, 1);

    Ok(())
}

#[tokio::test]
async fn test_approve_by_reason_ignores_direct_deposits() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service
        .deposit(&user(ALICE), "AP", 100, Some("quest"))
        .await?;

    let resolution = service.approve_requests(&admin(), ALICE, "quest").await?;
    assert!(resolution.is_empty());
    assert_eq!(balance_of(&service, ALICE, "AP").await?, 100);

    Ok(())
}

#[tokio::test]
async fn test_reject_by_reason() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service
        .request_deposit(&user(ALICE), "SP", 12, Some("event"))
        .await?;
    service
        .request_deposit(&user(BOB), "SP", 12, Some("event"))
        .await?;

    let resolution = service
        .reject_requests(&admin(), ALICE, "event", None)
        .await?;
    assert_eq!(resolution.resolved.len(), 1);
    assert_eq!(
        resolution.resolved[0].status,
        Some(TransactionStatus::Rejected)
    );
    assert!(resolution.credited.is_empty());
    let notice = resolution.notice.expect("rejection notifies the user");
    assert!(notice.message.contains("No reason provided"));
    assert_eq!(balance_of(&service, ALICE, "SP").await?, 0);

    // Rejected rows cannot be approved afterwards
    let resolution = service.approve_requests(&admin(), ALICE, "event").await?;
    assert!(resolution.is_empty());

    // Bob's request with the same reason is untouched
    let resolution = service
        .reject_requests(&admin(), BOB, "event", Some("duplicate entry"))
        .await?;
    assert_eq!(resolution.resolved.len(), 1);
    assert!(
        resolution
            .notice
            .expect("rejection notifies the user")
            .message
            .contains("duplicate entry")
    );

    Ok(())
}

#[tokio::test]
async fn test_reason_flow_and_id_flow_are_separate() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service
        .request_deposits(&user(ALICE), "AP", "10", Some("event"))
        .await?;
    let request = service
        .request_deposit(&user(ALICE), "AP", 20, Some("event"))
        .await?;

    // Pending rows are not reason-keyed requests
    let resolution = service.approve_requests(&admin(), ALICE, "event").await?;
    assert_eq!(resolution.resolved.len(), 1);
    assert_eq!(resolution.resolved[0].id, request.id);
    assert_eq!(balance_of(&service, ALICE, "AP").await?, 20);

    // Reason-keyed requests are not pending rows
    let outcome = service
        .resolve_pending(&admin(), &ids(&[request.id]), true)
        .await?;
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(service.pending_deposits(&admin()).await?.len(), 1);

    Ok(())
}
