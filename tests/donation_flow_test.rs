mod common;

use axum::http::StatusCode;
use benefactor::{
    config::PollingConfig,
    domain::{MobileNetwork, PaymentStatus},
    payments::{CardTransaction, PollOutcome, PollSnapshot, PollState},
    repository::DonationRepository,
};
use common::{FakeMobileProvider, TestApp};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn donation_body(method: &str, amount: i64) -> serde_json::Value {
    json!({
        "donorName": "Grace Namutebi",
        "donorPhone": "+256 772 123456",
        "donorEmail": "",
        "amount": amount,
        "paymentMethod": method,
    })
}

#[tokio::test]
async fn test_manual_donation_stays_pending() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let (status, body) = app.post_json("/api/donations", donation_body("manual", 5000)).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["paymentMethod"], "manual");
    assert!(body["message"].as_str().unwrap().contains("UGX 5,000"));
    assert!(body["receiptNumber"].as_str().unwrap().starts_with("RCP-"));
    assert!(body.get("instructions").is_some());

    assert_eq!(app.mtn.pay_calls(), 0);
    assert_eq!(app.airtel.pay_calls(), 0);
    assert_eq!(app.card.checkout_calls.load(Ordering::SeqCst), 0);

    // Empty email is stored as absent.
    let donation = app
        .context
        .donation_repo
        .find_by_receipt(body["receiptNumber"].as_str().unwrap())
        .await?
        .unwrap();
    assert!(donation.donor_email.is_none());

    Ok(())
}

#[tokio::test]
async fn test_below_minimum_is_rejected() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let (status, body) = app.post_json("/api/donations", donation_body("mtn", 999)).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("1,000"));

    assert_eq!(app.donation_count().await?, 0);
    assert_eq!(app.mtn.pay_calls(), 0);

    Ok(())
}

#[tokio::test]
async fn test_invalid_donor_fields_are_rejected() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let mut body = donation_body("manual", 5000);
    body["donorName"] = json!("G");
    body["donorEmail"] = json!("not-an-email");
    let (status, _) = app.post_json("/api/donations", body).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.donation_count().await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_mobile_donation_prompts_handset() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let (status, body) = app.post_json("/api/donations", donation_body("mtn", 10000)).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.mtn.pay_calls(), 1);

    assert_eq!(body["status"], "processing");

    let reference = body["referenceId"].as_str().unwrap().to_string();
    assert!(body["message"].as_str().unwrap().contains(&reference));

    let donation = app.context.donation_repo.find_by_reference(&reference).await?.unwrap();
    assert_eq!(donation.payment_status, PaymentStatus::Processing);
    assert_eq!(donation.amount, 10000);

    let request = app.mtn.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.amount, 10000);
    assert_eq!(request.reference, donation.receipt_number);

    // A status poll is scheduled for the new reference.
    let (status, poll) = app.get(&format!("/api/payments/poll/{}", reference)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(poll["provider"], "mtn");
    assert_eq!(poll["maxAttempts"], 12);

    let response = app
        .send(
            axum::http::Request::delete(format!("/api/payments/poll/{}", reference))
                .body(axum::body::Body::empty())?,
        )
        .await?;
    assert_eq!(response.0, StatusCode::NO_CONTENT);

    Ok(())
}

#[tokio::test]
async fn test_failed_initiation_leaves_donation_pending() -> anyhow::Result<()> {
    let app = TestApp::with_mtn(FakeMobileProvider::failing(MobileNetwork::Mtn)).await?;

    let (status, body) = app.post_json("/api/donations", donation_body("mtn", 5000)).await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Insufficient funds");

    let donations = app.context.donation_repo.list(10, 0).await?;
    assert_eq!(donations.len(), 1);
    assert_eq!(donations[0].payment_status, PaymentStatus::Pending);

    Ok(())
}

#[tokio::test]
async fn test_initiate_rejects_mismatched_amount() -> anyhow::Result<()> {
    let app = TestApp::with_mtn(FakeMobileProvider::failing(MobileNetwork::Mtn)).await?;
    app.post_json("/api/donations", donation_body("mtn", 5000)).await?;
    let donation = app.context.donation_repo.list(1, 0).await?.remove(0);

    let (status, _) = app
        .post_json(
            "/api/payments/initiate",
            json!({
                "donationId": donation.id,
                "paymentMethod": "mtn",
                "amount": 7000,
                "phoneNumber": "0772123456",
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_status_check_records_outcome() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let (_, body) = app.post_json("/api/donations", donation_body("airtel", 20000)).await?;
    let reference = body["referenceId"].as_str().unwrap().to_string();
    app.airtel.set_status(PaymentStatus::Success);

    let (status, body) = app
        .post_json(
            "/api/payments/status",
            json!({ "referenceId": reference, "provider": "airtel" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "success");

    let donation = app.context.donation_repo.find_by_reference(&reference).await?.unwrap();
    assert_eq!(donation.payment_status, PaymentStatus::Success);
    assert!(donation.receipt_generated);

    let (status, receipt) = app
        .get(&format!("/api/donations/{}", donation.receipt_number))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["paymentStatus"], "success");
    assert_eq!(receipt["receiptGenerated"], true);

    Ok(())
}

#[tokio::test]
async fn test_status_check_rejects_unknown_provider() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let (status, _) = app
        .post_json(
            "/api/payments/status",
            json!({ "referenceId": "abc", "provider": "card" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.mtn.status_calls() + app.airtel.status_calls(), 0);

    Ok(())
}

#[tokio::test]
async fn test_card_donation_opens_checkout() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let (status, body) = app.post_json("/api/donations", donation_body("card", 50000)).await?;
    assert_eq!(status, StatusCode::CREATED);

    let receipt = body["receiptNumber"].as_str().unwrap();
    assert_eq!(body["referenceId"], receipt);
    assert!(body["paymentLink"].as_str().unwrap().ends_with(receipt));

    let checkout = app.card.last_checkout.lock().unwrap().clone().unwrap();
    assert_eq!(checkout.tx_ref, receipt);
    assert_eq!(checkout.email, "256772123456@temp.com");
    assert_eq!(checkout.redirect_url, "https://donate.test/donate/verify");

    let donation = app.context.donation_repo.find_by_receipt(receipt).await?.unwrap();
    assert_eq!(donation.payment_status, PaymentStatus::Processing);

    Ok(())
}

#[tokio::test]
async fn test_cancelled_card_redirect_skips_gateway() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let (_, body) = app.post_json("/api/donations", donation_body("card", 50000)).await?;
    let receipt = body["receiptNumber"].as_str().unwrap().to_string();

    let (status, body) = app
        .post_json(
            "/api/payments/card/verify",
            json!({ "status": "cancelled", "txRef": receipt }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert_eq!(app.card.verify_calls(), 0);

    let donation = app.context.donation_repo.find_by_receipt(&receipt).await?.unwrap();
    assert_eq!(donation.payment_status, PaymentStatus::Processing);

    Ok(())
}

#[tokio::test]
async fn test_card_verify_settles_donation() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    let (_, body) = app.post_json("/api/donations", donation_body("card", 50000)).await?;
    let receipt = body["receiptNumber"].as_str().unwrap().to_string();

    app.card.will_verify(CardTransaction {
        id: "288200108".to_string(),
        tx_ref: receipt.clone(),
        status: PaymentStatus::Success,
        amount: Some(50000.0),
        currency: Some("UGX".to_string()),
    });

    let (status, body) = app
        .post_json(
            "/api/payments/card/verify",
            json!({ "transactionId": "288200108", "txRef": receipt, "status": "successful" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["transactionId"], "288200108");
    assert_eq!(body["reference"], receipt.as_str());

    let donation = app.context.donation_repo.find_by_receipt(&receipt).await?.unwrap();
    assert_eq!(donation.payment_status, PaymentStatus::Success);
    assert_eq!(donation.provider_transaction_id.as_deref(), Some("288200108"));

    Ok(())
}

#[tokio::test]
async fn test_card_verify_requires_transaction_id() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let (status, _) = app
        .post_json("/api/payments/card/verify", json!({ "txRef": "RCP-20260101-AAAAAAAA" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.card.verify_calls(), 0);

    Ok(())
}

#[tokio::test]
async fn test_unknown_receipt_is_not_found() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let (status, _) = app.get("/api/donations/RCP-20260101-NOTTHERE").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/payments/poll/unknown-ref").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_health_and_manual_instructions() -> anyhow::Result<()> {
    let app = TestApp::new().await?;

    let (status, body) = app.get("/health").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/api/payments/manual-instructions").await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["instructions"].is_null());
    assert_eq!(body["numbers"], json!([]));

    Ok(())
}

#[tokio::test]
async fn test_status_check_ignores_other_payment_methods() -> anyhow::Result<()> {
    let app = TestApp::new().await?;
    app.airtel.set_status(PaymentStatus::Failed);
    app.mtn.set_status(PaymentStatus::Failed);

    let (_, manual) = app.post_json("/api/donations", donation_body("manual", 5000)).await?;
    let (_, card) = app.post_json("/api/donations", donation_body("card", 5000)).await?;
    let (_, airtel) = app.post_json("/api/donations", donation_body("airtel", 5000)).await?;

    let airtel_reference = airtel["referenceId"].as_str().unwrap().to_string();
    let cases = [
        (manual["receiptNumber"].as_str().unwrap().to_string(), "airtel"),
        (card["receiptNumber"].as_str().unwrap().to_string(), "mtn"),
        (airtel_reference.clone(), "mtn"),
    ];

    for (reference, provider) in cases {
        let (status, _) = app
            .post_json(
                "/api/payments/status",
                json!({ "referenceId": reference, "provider": provider }),
            )
            .await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "{} via {}", reference, provider);
    }
    assert_eq!(app.mtn.status_calls() + app.airtel.status_calls(), 0);

    let repo = &app.context.donation_repo;
    let manual = repo.find_by_receipt(manual["receiptNumber"].as_str().unwrap()).await?.unwrap();
    assert_eq!(manual.payment_status, PaymentStatus::Pending);
    let card = repo.find_by_receipt(card["receiptNumber"].as_str().unwrap()).await?.unwrap();
    assert_eq!(card.payment_status, PaymentStatus::Processing);
    let airtel = repo.find_by_reference(&airtel_reference).await?.unwrap();
    assert_eq!(airtel.payment_status, PaymentStatus::Processing);

    Ok(())
}

fn immediate_polling() -> PollingConfig {
    PollingConfig {
        initial_delay_secs: 0,
        interval_secs: 0,
        max_attempts: 12,
    }
}

async fn wait_settled(app: &TestApp, reference: &str) -> PollSnapshot {
    for _ in 0..500 {
        if let Some(snapshot) = app.context.poller.snapshot(reference).await {
            if snapshot.state == PollState::Settled {
                return snapshot;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("polling for {} never settled", reference);
}

#[tokio::test]
async fn test_exhausted_polling_leaves_row_processing() -> anyhow::Result<()> {
    let app = TestApp::with_polling(immediate_polling()).await?;

    let (_, body) = app.post_json("/api/donations", donation_body("mtn", 10000)).await?;
    let reference = body["referenceId"].as_str().unwrap().to_string();

    let snapshot = wait_settled(&app, &reference).await;
    assert_eq!(snapshot.outcome, Some(PollOutcome::TimedOut));
    assert_eq!(snapshot.attempts, 12);
    assert_eq!(app.mtn.status_calls(), 12);

    let donation = app.context.donation_repo.find_by_reference(&reference).await?.unwrap();
    assert_eq!(donation.payment_status, PaymentStatus::Processing);
    assert!(!donation.receipt_generated);

    Ok(())
}

#[tokio::test]
async fn test_polling_records_success() -> anyhow::Result<()> {
    let app = TestApp::with_polling(immediate_polling()).await?;
    app.mtn.set_status(PaymentStatus::Success);

    let (_, body) = app.post_json("/api/donations", donation_body("mtn", 10000)).await?;
    let reference = body["referenceId"].as_str().unwrap().to_string();

    let snapshot = wait_settled(&app, &reference).await;
    assert_eq!(snapshot.outcome, Some(PollOutcome::Succeeded));
    assert_eq!(snapshot.attempts, 1);

    let donation = app.context.donation_repo.find_by_reference(&reference).await?.unwrap();
    assert_eq!(donation.payment_status, PaymentStatus::Success);
    assert!(donation.receipt_generated);

    let (_, receipt) = app
        .get(&format!("/api/donations/{}", donation.receipt_number))
        .await?;
    assert_eq!(receipt["paymentStatus"], "success");

    Ok(())
}
