//! End-to-end flow tests
//!
//! Drives the flow engine, record store and matching service together over an
//! in-memory database with a recording notifier.

mod helpers;

use assert_matches::assert_matches;
use helpers::test_services;

use RideMate::models::user::{Role, Route};
use RideMate::services::UserService;
use RideMate::state::{Action, Prompt, Rejection, Step};
use RideMate::utils::errors::RideMateError;

#[tokio::test]
async fn driver_registration_end_to_end() {
    let (services, notifier) = test_services().await;
    let engine = &services.engine;

    let (mut ctx, prompt) = engine.start_registration(1, Role::Driver);
    assert_eq!(prompt, Prompt::AskName(Role::Driver));

    let applied = engine
        .apply(&mut ctx, Action::Text("Ivan".to_string()))
        .await
        .unwrap();
    assert_eq!(applied.prompt, Prompt::AskPhone);

    let applied = engine
        .apply(
            &mut ctx,
            Action::ContactShared {
                phone_number: "+998901234567".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(applied.prompt, Prompt::AskPassportPhoto);
    // No driver record before the payment-proof commit point
    assert!(services.users.find(1).await.unwrap().is_none());

    let applied = engine
        .apply(
            &mut ctx,
            Action::ImageUploaded {
                file_id: "passport-img".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(applied.prompt, Prompt::AskCarInfo);

    let applied = engine
        .apply(&mut ctx, Action::Text("White Chevrolet Cobalt".to_string()))
        .await
        .unwrap();
    assert_eq!(applied.prompt, Prompt::AskPaymentProof);

    let applied = engine
        .apply(
            &mut ctx,
            Action::ImageUploaded {
                file_id: "payment-img".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(applied.prompt, Prompt::ApprovalPending);
    assert!(!applied.done);

    // Record committed, pending approval
    let record = services.users.find(1).await.unwrap().unwrap();
    assert_eq!(record.role, Role::Driver);
    assert_eq!(record.name, "Ivan");
    assert!(!record.available);
    assert_eq!(record.passport.as_deref(), Some("passport-img"));
    assert_eq!(record.payment.as_deref(), Some("payment-img"));
    assert!(record.subscription_end.is_some());

    // Application forwarded to the operator
    let approvals = notifier.approvals.lock().await;
    assert_eq!(approvals.len(), 1);
    assert_eq!(approvals[0].user_id, 1);
    drop(approvals);

    // Messages while waiting for approval only get a reminder
    let applied = engine
        .apply(&mut ctx, Action::Text("hello?".to_string()))
        .await
        .unwrap();
    assert_eq!(applied.prompt, Prompt::ApprovalPending);

    // Operator approves
    let (mut ctx, prompt) = engine
        .approve(1, Some(ctx))
        .await
        .unwrap()
        .expect("pending application");
    assert_eq!(prompt, Prompt::AskRoute(Role::Driver));
    assert!(services.users.find(1).await.unwrap().unwrap().available);

    let applied = engine
        .apply(&mut ctx, Action::RouteChosen(Route::TashkentNukus))
        .await
        .unwrap();
    assert_eq!(applied.prompt, Prompt::AskPrice(Route::TashkentNukus));

    let applied = engine
        .apply(&mut ctx, Action::Text("50000".to_string()))
        .await
        .unwrap();
    assert!(applied.done);
    assert_eq!(
        applied.prompt,
        Prompt::DriverReady {
            route: Some(Route::TashkentNukus),
            price: 50_000
        }
    );

    let record = services.users.find(1).await.unwrap().unwrap();
    assert_eq!(record.route, Some(Route::TashkentNukus));
    assert_eq!(record.price, Some(50_000));
    assert!(UserService::is_registration_complete(&record));
}

#[tokio::test]
async fn invalid_inputs_do_not_advance_the_flow() {
    let (services, _) = test_services().await;
    let engine = &services.engine;

    let (mut ctx, _) = engine.start_registration(2, Role::Driver);

    let applied = engine
        .apply(&mut ctx, Action::Text("Ivan42".to_string()))
        .await
        .unwrap();
    assert_matches!(applied.prompt, Prompt::Invalid(Rejection::InvalidName(Role::Driver)));
    assert!(ctx.is_at(Role::Driver, Step::AwaitingName));

    engine
        .apply(&mut ctx, Action::Text("Ivan".to_string()))
        .await
        .unwrap();

    // Typing a number instead of sharing the contact
    let applied = engine
        .apply(&mut ctx, Action::Text("+998901234567".to_string()))
        .await
        .unwrap();
    assert_matches!(applied.prompt, Prompt::Invalid(Rejection::ContactRequired));
    assert!(ctx.is_at(Role::Driver, Step::AwaitingPhone));

    engine
        .apply(
            &mut ctx,
            Action::ContactShared {
                phone_number: "+998901234567".to_string(),
            },
        )
        .await
        .unwrap();

    let applied = engine
        .apply(&mut ctx, Action::Text("here is my passport".to_string()))
        .await
        .unwrap();
    assert_matches!(applied.prompt, Prompt::Invalid(Rejection::PhotoRequired));
    assert!(ctx.is_at(Role::Driver, Step::AwaitingPassportPhoto));

    // A rejected price keeps the record unpriced
    let (services, _) = test_services().await;
    let engine = &services.engine;
    let mut ctx = drive_to_price(&services, 3).await;
    let applied = engine
        .apply(&mut ctx, Action::Text("-5".to_string()))
        .await
        .unwrap();
    assert_matches!(applied.prompt, Prompt::Invalid(Rejection::InvalidPrice));
    assert!(services.users.find(3).await.unwrap().unwrap().price.is_none());
}

#[tokio::test]
async fn approve_is_a_no_op_without_a_pending_application() {
    let (services, _) = test_services().await;
    let engine = &services.engine;

    // Unknown user
    assert!(engine.approve(10, None).await.unwrap().is_none());

    // Committed passenger records have no approval gate
    let (mut ctx, _) = engine.start_registration(11, Role::Passenger);
    engine
        .apply(&mut ctx, Action::Text("Aziz".to_string()))
        .await
        .unwrap();
    engine
        .apply(
            &mut ctx,
            Action::ContactShared {
                phone_number: "+99893".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(engine.approve(11, Some(ctx)).await.unwrap().is_none());

    // Driver still in the document phase, nothing committed yet
    let (ctx, _) = engine.start_registration(12, Role::Driver);
    assert!(engine.approve(12, Some(ctx)).await.unwrap().is_none());

    // Approving twice: the second press finds no pending application
    drive_to_approval(&services, 13).await;
    assert!(engine.approve(13, None).await.unwrap().is_some());
    assert!(engine.approve(13, None).await.unwrap().is_none());
}

#[tokio::test]
async fn approval_survives_conversation_expiry() {
    let (services, _) = test_services().await;
    let engine = &services.engine;

    // The conversation is gone (idle cleanup or restart) but the committed
    // application record remains.
    drop(drive_to_approval(&services, 90).await);

    let (mut ctx, prompt) = engine
        .approve(90, None)
        .await
        .unwrap()
        .expect("pending application");
    assert_eq!(prompt, Prompt::AskRoute(Role::Driver));
    assert!(ctx.is_at(Role::Driver, Step::AwaitingRoute));
    assert!(services.users.find(90).await.unwrap().unwrap().available);

    // The recreated conversation finishes the flow normally
    engine
        .apply(&mut ctx, Action::RouteChosen(Route::TashkentNukus))
        .await
        .unwrap();
    let applied = engine
        .apply(&mut ctx, Action::Text("45000".to_string()))
        .await
        .unwrap();
    assert!(applied.done);
    let record = services.users.find(90).await.unwrap().unwrap();
    assert_eq!(record.price, Some(45_000));
}

#[tokio::test]
async fn reject_removes_the_application_record() {
    let (services, _) = test_services().await;
    let engine = &services.engine;

    drive_to_approval(&services, 20).await;
    assert!(services.users.find(20).await.unwrap().is_some());

    let prompt = engine.reject(20).await.unwrap();
    assert_eq!(prompt, Prompt::ApplicationRejected);
    assert!(services.users.find(20).await.unwrap().is_none());
}

#[tokio::test]
async fn passenger_registration_with_route_change() {
    let (services, _) = test_services().await;
    let engine = &services.engine;

    let (mut ctx, _) = engine.start_registration(30, Role::Passenger);

    // Single-letter names are rejected for passengers
    let applied = engine
        .apply(&mut ctx, Action::Text("A".to_string()))
        .await
        .unwrap();
    assert_matches!(applied.prompt, Prompt::Invalid(Rejection::InvalidName(Role::Passenger)));

    engine
        .apply(&mut ctx, Action::Text("Aziz".to_string()))
        .await
        .unwrap();
    let applied = engine
        .apply(
            &mut ctx,
            Action::ContactShared {
                phone_number: "+998935551122".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(applied.prompt, Prompt::AskRoute(Role::Passenger));

    // Passenger record is committed at the contact step, route still unset
    let record = services.users.find(30).await.unwrap().unwrap();
    assert_eq!(record.role, Role::Passenger);
    assert!(record.route.is_none());

    let applied = engine
        .apply(&mut ctx, Action::RouteChosen(Route::TashkentNukus))
        .await
        .unwrap();
    assert_eq!(applied.prompt, Prompt::ConfirmRoute(Route::TashkentNukus));

    // Changed their mind before confirming
    let applied = engine.apply(&mut ctx, Action::ChangeRoute).await.unwrap();
    assert_eq!(applied.prompt, Prompt::AskRoute(Role::Passenger));

    engine
        .apply(&mut ctx, Action::RouteChosen(Route::NukusTashkent))
        .await
        .unwrap();
    let applied = engine.apply(&mut ctx, Action::ConfirmRoute).await.unwrap();
    assert!(applied.done);
    assert_eq!(
        applied.prompt,
        Prompt::PassengerReady {
            route: Route::NukusTashkent
        }
    );

    let record = services.users.find(30).await.unwrap().unwrap();
    assert_eq!(record.route, Some(Route::NukusTashkent));
    assert!(UserService::is_registration_complete(&record));
}

#[tokio::test]
async fn arrival_time_stamped_only_on_route_replacement() {
    let (services, _) = test_services().await;

    services
        .users
        .register_driver(40, "Ivan", "+99890", "Cobalt", "p", "r")
        .await
        .unwrap();

    services.users.set_route(40, Route::TashkentNukus).await.unwrap();
    let record = services.users.find(40).await.unwrap().unwrap();
    assert!(record.last_arrival_time.is_none());

    // Re-picking the same route is not a replacement
    services.users.set_route(40, Route::TashkentNukus).await.unwrap();
    let record = services.users.find(40).await.unwrap().unwrap();
    assert!(record.last_arrival_time.is_none());

    services.users.set_route(40, Route::NukusTashkent).await.unwrap();
    let record = services.users.find(40).await.unwrap().unwrap();
    assert!(record.last_arrival_time.is_some());
}

#[tokio::test]
async fn matching_filters_and_requires_a_route() {
    let (services, _) = test_services().await;

    // Passenger without a route yet
    services
        .users
        .register_passenger(50, "Aziz", "+99893")
        .await
        .unwrap();
    let err = services.matching.find_drivers(50).await.unwrap_err();
    assert_matches!(err, RideMateError::NoRouteSet { user_id: 50 });

    // Unknown passenger
    let err = services.matching.find_drivers(999).await.unwrap_err();
    assert_matches!(err, RideMateError::UserNotFound { user_id: 999 });

    services.users.set_route(50, Route::TashkentNukus).await.unwrap();

    // Matching driver
    setup_driver(&services, 51, Route::TashkentNukus, Some(50_000), true).await;
    // Busy driver on the route
    setup_driver(&services, 52, Route::TashkentNukus, Some(60_000), false).await;
    // Available but unpriced
    setup_driver(&services, 53, Route::TashkentNukus, None, true).await;
    // Wrong direction
    setup_driver(&services, 54, Route::NukusTashkent, Some(70_000), true).await;

    let drivers = services.matching.find_drivers(50).await.unwrap();
    assert_eq!(drivers.len(), 1);
    assert_eq!(drivers[0].user_id, 51);
}

#[tokio::test]
async fn bookings_accumulate_and_survive_notification_failure() {
    let (services, notifier) = test_services().await;

    services
        .users
        .register_passenger(60, "Aziz", "+99893")
        .await
        .unwrap();
    services.users.set_route(60, Route::TashkentNukus).await.unwrap();
    setup_driver(&services, 61, Route::TashkentNukus, Some(50_000), true).await;

    let name = services.matching.book(60, 61).await.unwrap();
    assert_eq!(name, "Ivan");

    // Second booking by the same passenger counts again
    services.matching.book(60, 61).await.unwrap();
    let record = services.users.find(61).await.unwrap().unwrap();
    assert_eq!(record.rides_count, 2);
    assert_eq!(notifier.bookings.lock().await.len(), 2);

    // A dead notification channel does not roll the booking back
    notifier
        .fail_bookings
        .store(true, std::sync::atomic::Ordering::SeqCst);
    services.matching.book(60, 61).await.unwrap();
    let record = services.users.find(61).await.unwrap().unwrap();
    assert_eq!(record.rides_count, 3);
    assert_eq!(notifier.bookings.lock().await.len(), 2);
}

#[tokio::test]
async fn cancel_deletes_only_incomplete_records() {
    let (services, _) = test_services().await;
    let engine = &services.engine;

    // Passenger committed at the contact step but without a route yet
    let (mut ctx, _) = engine.start_registration(70, Role::Passenger);
    engine
        .apply(&mut ctx, Action::Text("Aziz".to_string()))
        .await
        .unwrap();
    engine
        .apply(
            &mut ctx,
            Action::ContactShared {
                phone_number: "+99893".to_string(),
            },
        )
        .await
        .unwrap();

    let applied = engine.apply(&mut ctx, Action::Cancel).await.unwrap();
    assert!(applied.done);
    assert_eq!(applied.prompt, Prompt::Cancelled);
    assert!(services.users.find(70).await.unwrap().is_none());

    // A completed registration survives a later cancelled route edit
    services
        .users
        .register_passenger(71, "Dima", "+99890")
        .await
        .unwrap();
    services.users.set_route(71, Route::TashkentNukus).await.unwrap();

    let mut ctx = RideMate::state::ConversationContext::new(
        71,
        RideMate::state::FlowState::Registration {
            role: Role::Passenger,
            step: Step::AwaitingRoute,
        },
    );
    let applied = engine.apply(&mut ctx, Action::Cancel).await.unwrap();
    assert!(applied.done);
    assert!(services.users.find(71).await.unwrap().is_some());
}

#[tokio::test]
async fn supervisor_cancels_idle_conversations() {
    let (services, notifier) = test_services().await;
    // Paused only after pool setup so the auto-advancing clock cannot trip
    // the acquire timeout.
    tokio::time::pause();
    let engine = &services.engine;

    let (ctx, _) = engine.start_registration(80, Role::Driver);
    let seq = ctx.activity_seq;
    services.storage.save(ctx).await;

    services.supervisor.watch(80, seq).await.unwrap();

    assert!(!services.storage.exists(80).await);
    assert_eq!(*notifier.timeouts.lock().await, vec![80]);
}

#[tokio::test]
async fn supervisor_backs_off_after_activity() {
    let (services, notifier) = test_services().await;
    tokio::time::pause();
    let engine = &services.engine;

    let (mut ctx, _) = engine.start_registration(81, Role::Driver);
    let stale_seq = ctx.activity_seq;
    services.storage.save(ctx.clone()).await;
    let stale_check = services.supervisor.watch(81, stale_seq);

    // User acts before the check fires
    ctx.touch();
    services.storage.save(ctx).await;

    stale_check.await.unwrap();
    assert!(services.storage.exists(81).await);
    assert!(notifier.timeouts.lock().await.is_empty());
}

/// Register, approve and route a driver, stopping at the price step.
async fn drive_to_price(
    services: &RideMate::services::ServiceFactory,
    user_id: i64,
) -> RideMate::state::ConversationContext {
    let ctx = drive_to_approval(services, user_id).await;
    let (mut ctx, _) = services
        .engine
        .approve(user_id, Some(ctx))
        .await
        .unwrap()
        .expect("pending application");
    services
        .engine
        .apply(&mut ctx, Action::RouteChosen(Route::TashkentNukus))
        .await
        .unwrap();
    ctx
}

/// Run a driver through the document phase up to the approval gate.
async fn drive_to_approval(
    services: &RideMate::services::ServiceFactory,
    user_id: i64,
) -> RideMate::state::ConversationContext {
    let engine = &services.engine;
    let (mut ctx, _) = engine.start_registration(user_id, Role::Driver);
    engine
        .apply(&mut ctx, Action::Text("Ivan".to_string()))
        .await
        .unwrap();
    engine
        .apply(
            &mut ctx,
            Action::ContactShared {
                phone_number: "+998901234567".to_string(),
            },
        )
        .await
        .unwrap();
    engine
        .apply(
            &mut ctx,
            Action::ImageUploaded {
                file_id: "passport".to_string(),
            },
        )
        .await
        .unwrap();
    engine
        .apply(&mut ctx, Action::Text("Cobalt".to_string()))
        .await
        .unwrap();
    engine
        .apply(
            &mut ctx,
            Action::ImageUploaded {
                file_id: "receipt".to_string(),
            },
        )
        .await
        .unwrap();
    ctx
}

/// Insert a registered driver with the given route/price/availability.
async fn setup_driver(
    services: &RideMate::services::ServiceFactory,
    user_id: i64,
    route: Route,
    price: Option<i64>,
    available: bool,
) {
    services
        .users
        .register_driver(user_id, "Ivan", "+99890", "Cobalt", "p", "r")
        .await
        .unwrap();
    services.users.set_route(user_id, route).await.unwrap();
    if let Some(price) = price {
        services.users.set_price(user_id, price).await.unwrap();
    }
    services.users.set_availability(user_id, available).await.unwrap();
}
