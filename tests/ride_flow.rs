use assert_matches::assert_matches;
use crux_core::testing::AppTester;
use crux_http::protocol::HttpResponse;

use ridegenie_shared::capabilities::{DispatchOutput, GeolocationError, PaymentOutput, TimeOutput};
use ridegenie_shared::{App, Driver, Effect, Event, Model, RideStatus, ViewState};

fn search_hit_body() -> String {
    serde_json::json!({
        "candidates": [{
            "content": { "parts": [{ "text": "The main international airport." }] },
            "groundingMetadata": { "groundingChunks": [
                { "maps": { "uri": "maps://x", "title": "SF International Airport" } }
            ]}
        }]
    })
    .to_string()
}

/// Drive the app from a fresh model to Idle at the fallback location:
/// login (simulated delay), then a failing geolocation fix.
fn login_to_idle(app: &AppTester<App, Effect>, model: &mut Model) {
    let update = app.update(
        Event::LoginSubmitted {
            email: "rider@example.com".into(),
            country: Some("Morocco".into()),
        },
        model,
    );

    let mut timer = update
        .effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Time(req) => Some(req),
            _ => None,
        })
        .expect("login should arm the simulated delay");

    let update = app.resolve(&mut timer, TimeOutput::Elapsed).expect("timer resolves");
    let event = update.events.into_iter().next().expect("login completion");
    let update = app.update(event, model);

    assert_eq!(model.status, RideStatus::Locating);
    assert!(model.user.is_some());

    let mut geo = update
        .effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Geolocation(req) => Some(req),
            _ => None,
        })
        .expect("locating should request a position");

    let update = app
        .resolve(&mut geo, Err(GeolocationError::PermissionDenied))
        .expect("geolocation resolves");
    let event = update.events.into_iter().next().expect("position event");
    app.update(event, model);

    assert_eq!(model.status, RideStatus::Idle);
    assert_eq!(
        model.location.expect("fallback location").as_tuple(),
        (37.7749, -122.4194)
    );
    assert!(model.active_error.is_none(), "geolocation failure is absorbed");
}

/// Submit a query and feed back the assistant's answer.
fn search(app: &AppTester<App, Effect>, model: &mut Model, query: &str, body: &str, status: u16) {
    app.update(
        Event::QueryChanged {
            text: query.into(),
        },
        model,
    );
    let update = app.update(Event::SearchSubmitted, model);
    assert_eq!(model.status, RideStatus::Searching);

    let mut request = update
        .effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Http(req) => Some(req),
            _ => None,
        })
        .expect("search should call the assistant");

    let response = HttpResponse::status(status).body(body).build();
    let update = app
        .resolve(&mut request, crux_http::protocol::HttpResult::Ok(response))
        .expect("http resolves");
    let event = update.events.into_iter().next().expect("search response event");
    app.update(event, model);
}

#[test]
fn full_ride_lifecycle() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();

    login_to_idle(&app, &mut model);

    // Search resolves a destination; Economy is pre-selected
    search(&app, &mut model, "airport", &search_hit_body(), 200);
    assert_eq!(model.status, RideStatus::SelectingRide);
    let destination = model.destination.as_ref().expect("destination stored");
    assert_eq!(destination.name, "SF International Airport");
    assert_eq!(destination.map_uri.as_deref(), Some("maps://x"));

    // Confirm → payment sheet → charge
    app.update(Event::ConfirmRequested, &mut model);
    assert!(model.show_payment);

    let update = app.update(Event::PaySubmitted, &mut model);
    let mut charge = update
        .effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Payment(req) => Some(req),
            _ => None,
        })
        .expect("payment should be charged");

    let update = app
        .resolve(
            &mut charge,
            Ok(PaymentOutput::Confirmed {
                receipt_id: "rcpt-1".into(),
            }),
        )
        .expect("payment resolves");
    let event = update.events.into_iter().next().expect("payment event");
    let update = app.update(event, &mut model);

    assert_eq!(model.status, RideStatus::Requesting);
    assert!(!model.show_payment);

    // Dispatch books the ride and the countdown starts at eta * 60
    let ride_id = model.ride_id.expect("ride id assigned");
    let mut booking = update
        .effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Dispatch(req) => Some(req),
            _ => None,
        })
        .expect("requesting should dispatch");

    let update = app
        .resolve(
            &mut booking,
            Ok(DispatchOutput::Booked {
                ride_id,
                driver: Driver::default(),
            }),
        )
        .expect("dispatch resolves");
    let event = update.events.into_iter().next().expect("booking event");
    let update = app.update(event, &mut model);

    assert_eq!(model.status, RideStatus::OnRide);
    assert_eq!(model.countdown.expect("countdown").remaining_secs(), 240);
    assert_matches!(
        app.view(&model).state,
        ViewState::OnRide { ref arrival_display, .. } if arrival_display == "4:00"
    );

    // One tick
    let mut tick = update
        .effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Time(req) => Some(req),
            _ => None,
        })
        .expect("countdown should be armed");
    let update = app.resolve(&mut tick, TimeOutput::Elapsed).expect("tick resolves");
    let event = update.events.into_iter().next().expect("tick event");
    let update = app.update(event, &mut model);
    assert_eq!(model.countdown.expect("countdown").remaining_secs(), 239);

    // Cancel drops everything ride-scoped
    app.update(Event::CancelRequested, &mut model);
    assert_eq!(model.status, RideStatus::Idle);
    assert!(model.destination.is_none());
    assert!(model.countdown.is_none());
    assert!(model.driver.is_none());
    assert!(model.query.is_empty());

    // The still-pending tick fires for a dead ride and is discarded
    let mut stale_tick = update
        .effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Time(req) => Some(req),
            _ => None,
        })
        .expect("tick re-armed before cancel");
    let update = app
        .resolve(&mut stale_tick, TimeOutput::Elapsed)
        .expect("stale tick resolves");
    let event = update.events.into_iter().next().expect("stale tick event");
    app.update(event, &mut model);
    assert_eq!(model.status, RideStatus::Idle);
    assert!(model.countdown.is_none());
}

#[test]
fn payment_sheet_can_be_cancelled_without_losing_the_ride() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();

    login_to_idle(&app, &mut model);
    search(&app, &mut model, "airport", &search_hit_body(), 200);

    app.update(Event::ConfirmRequested, &mut model);
    let update = app.update(Event::PaySubmitted, &mut model);

    let mut charge = update
        .effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Payment(req) => Some(req),
            _ => None,
        })
        .expect("payment charge requested");

    let update = app
        .resolve(&mut charge, Ok(PaymentOutput::Cancelled))
        .expect("payment resolves");
    let event = update.events.into_iter().next().expect("payment event");
    app.update(event, &mut model);

    assert_eq!(model.status, RideStatus::SelectingRide);
    assert!(!model.show_payment);
    assert!(!model.payment_in_flight);
    assert!(model.destination.is_some(), "destination survives a dismissed sheet");
}

#[test]
fn selecting_a_tier_reprices_the_prompt() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();

    login_to_idle(&app, &mut model);
    search(&app, &mut model, "airport", &search_hit_body(), 200);

    app.update(
        Event::RideSelected {
            tier: ridegenie_shared::fare::RideTier::Premium,
        },
        &mut model,
    );
    app.update(Event::ConfirmRequested, &mut model);

    // Morocco multiplies the 28.00 base by 10
    assert_matches!(
        app.view(&model).state,
        ViewState::SelectingRide { payment: Some(ref prompt), .. }
            if prompt.price_display == "DH 280.00" && prompt.service_name == "Genie Premium"
    );
}

#[test]
fn logout_discards_the_whole_session() {
    let app = AppTester::<App, _>::default();
    let mut model = Model::default();

    login_to_idle(&app, &mut model);
    search(&app, &mut model, "airport", &search_hit_body(), 200);
    assert_eq!(model.status, RideStatus::SelectingRide);

    app.update(Event::LogoutRequested, &mut model);

    assert_eq!(model.status, RideStatus::Locating);
    assert!(model.user.is_none());
    assert!(model.destination.is_none());
    assert!(model.location.is_none());
    assert_matches!(
        app.view(&model).state,
        ViewState::Landing { is_authenticating: false }
    );
}
