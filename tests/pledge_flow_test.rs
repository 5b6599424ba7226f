use chrono::NaiveDate;
use crowdfunding::application::gateway::{GatewayDispatcher, PaymentGatewayRef, RequestData};
use crowdfunding::application::manual::ManualGateway;
use crowdfunding::application::notifier::Notifier;
use crowdfunding::application::payments::{PaymentRequest, Payments};
use crowdfunding::application::pledge::{Backer, PledgeWizard};
use crowdfunding::application::toolkit::GatewayToolkit;
use crowdfunding::config::ComponentParams;
use crowdfunding::domain::ports::Stores;
use crowdfunding::domain::session::SessionKeys;
use crowdfunding::infrastructure::in_memory::InMemoryUserDirectory;
use crowdfunding::interfaces::json::seed::Seed;
use rust_decimal_macros::dec;
use std::sync::Arc;

async fn stores() -> Stores {
    let seed = Seed::from_json(include_str!("fixtures/seed.json")).unwrap();
    let directory = InMemoryUserDirectory::new();
    for user in &seed.users {
        directory.insert(user.clone()).await;
    }
    let mut stores = Stores::in_memory();
    stores.users = Arc::new(directory);
    seed.apply(&stores).await.unwrap();
    stores
}

#[tokio::test]
async fn test_wizard_payment_and_ajax_notification() {
    let stores = stores().await;
    let toolkit = GatewayToolkit::new(stores.clone(), Arc::new(ComponentParams::default()));
    let manual: PaymentGatewayRef = Arc::new(ManualGateway::new(toolkit.clone()));
    let mut gateways = GatewayDispatcher::new();
    gateways.register(manual);

    let wizard = PledgeWizard::new(stores.clone(), gateways.clone());
    let payments = Payments::new(gateways.clone(), toolkit.clone());
    let notifier = Notifier::new(gateways, toolkit);

    let backer = Backer {
        user_key: "browser-session".to_string(),
        user_id: 5,
    };
    let today = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();

    wizard
        .select(&backer, 1, dec!(35), Some(7), today)
        .await
        .unwrap();
    let session = wizard.confirm(&backer, 1, "manual", today).await.unwrap();

    let request = PaymentRequest {
        project_id: 1,
        session_id: Some(session.session_id.clone()),
        ..PaymentRequest::default()
    };
    let redirect = payments.authorize(&backer, &request).await.unwrap();
    assert!(redirect.url.contains("/projects/3/1:solar-kiln/backing"));

    // The gateway reports back with only the session and its own id
    let notification = RequestData::from([
        ("txn_id".to_string(), "AJAX-1".to_string()),
        ("session_id".to_string(), session.session_id.clone()),
        ("status".to_string(), "completed".to_string()),
    ]);
    let response = notifier.notify_ajax("manual", &notification).await;
    assert!(response.success, "{response:?}");

    let project = stores.projects.get(1).await.unwrap().unwrap();
    assert_eq!(project.funded.value(), dec!(35));
    let reward = stores.rewards.get(7).await.unwrap().unwrap();
    assert_eq!(reward.distributed, 8);

    let keys = SessionKeys::SessionId(session.session_id);
    assert!(stores.sessions.find(&keys).await.unwrap().is_none());
    let intention_id = session.intention_id.unwrap();
    assert!(stores.intentions.get(intention_id).await.unwrap().is_none());

    wizard.reset(&backer, 1).await.unwrap();
    assert!(!wizard.process(&backer, 1).await.unwrap().step1);
}

#[tokio::test]
async fn test_stores_as_trait_objects() {
    let stores = stores().await;

    // Verify Send + Sync by spawning tasks
    let projects = stores.projects.clone();
    let handle = tokio::spawn(async move { projects.adjust_funds(1, dec!(12.5)).await.unwrap() });
    let rewards = stores.rewards.clone();
    let distributed = tokio::spawn(async move { rewards.distribute(8, 1).await.unwrap() });

    assert_eq!(handle.await.unwrap().funded.value(), dec!(12.5));
    assert_eq!(distributed.await.unwrap().distributed, 1);
    assert!(stores.rewards.distribute(8, 1).await.is_err());
}
