mod common;

use anyhow::Result;
use common::{ALICE, BOB, admin, fund, test_service, user};
use guildbank::io::{Exporter, LedgerSnapshot};

#[tokio::test]
async fn test_export_transactions_csv() -> Result<()> {
    let (service, _temp) = test_service().await?;
    fund(&service, ALICE, "YEN", 500).await?;
    service.transfer(&user(ALICE), BOB, 120).await?;
    service
        .request_deposits(&user(BOB), "AP", "9", Some("event"))
        .await?;

    let mut buf = Vec::new();
    let count = Exporter::new(&service, admin())
        .export_transactions_csv(&mut buf)
        .await?;
    assert_eq!(count, 4);

    let text = String::from_utf8(buf)?;
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(
        lines[0],
        "id,user_id,kind,amount,currency,reason,timestamp,status"
    );
    assert!(lines[2].contains("transfer_out"));
    assert!(lines[3].contains("transfer_in"));
    assert!(lines[4].ends_with(",PENDING"));

    Ok(())
}

#[tokio::test]
async fn test_export_balances_csv() -> Result<()> {
    let (service, _temp) = test_service().await?;
    fund(&service, ALICE, "AP", 7).await?;
    fund(&service, BOB, "REPUTATION", 3).await?;

    let mut buf = Vec::new();
    let count = Exporter::new(&service, admin())
        .export_balances_csv(&mut buf)
        .await?;
    assert_eq!(count, 2);

    let text = String::from_utf8(buf)?;
    assert_eq!(
        text,
        "user_id,ap,sp,yen,reputation\n100,7,0,0,0\n200,0,0,0,3\n"
    );

    Ok(())
}

#[tokio::test]
async fn test_export_full_json_snapshot() -> Result<()> {
    let (service, _temp) = test_service().await?;
    fund(&service, ALICE, "SP", 40).await?;

    let mut buf = Vec::new();
    let snapshot = Exporter::new(&service, admin())
        .export_full_json(&mut buf)
        .await?;
    assert_eq!(snapshot.accounts.len(), 1);
    assert_eq!(snapshot.transactions.len(), 1);

    let parsed: LedgerSnapshot = serde_json::from_slice(&buf)?;
    assert_eq!(parsed.accounts, snapshot.accounts);
    assert_eq!(parsed.transactions, snapshot.transactions);

    Ok(())
}

#[tokio::test]
async fn test_export_requires_admin() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let mut buf = Vec::new();
    let result = Exporter::new(&service, user(ALICE))
        .export_transactions_csv(&mut buf)
        .await;
    assert!(result.is_err());
    assert!(buf.is_empty());

    Ok(())
}
