#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod assistant;
pub mod capabilities;
pub mod fare;
#[cfg(feature = "studio")]
pub mod studio;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::assistant::{AssistantConfig, GenerateContentResponse};
use crate::fare::{price_for, ride_option, FormattedPrice, RideOption, RideTier, RIDE_CATALOG};

pub use app::App;
pub use capabilities::{Capabilities, Effect};

pub const FALLBACK_LATITUDE: f64 = 37.7749;
pub const FALLBACK_LONGITUDE: f64 = -122.4194;
pub const LOGIN_DELAY_MS: u64 = 1500;
pub const COUNTDOWN_TICK_MS: u64 = 1000;
/// Fixed delays the demo shells apply before confirming a charge or a
/// booking. The core never waits on these itself; they document the
/// simulated-collaborator contract.
pub const SIMULATED_PAYMENT_DELAY_MS: u64 = 2000;
pub const SIMULATED_DISPATCH_DELAY_MS: u64 = 2000;

pub const SEARCH_FAILED_MESSAGE: &str = "Failed to search destination. Please try again.";
pub const NO_MATCH_MESSAGE: &str =
    "Could not find that destination. Please try being more specific.";

pub const AVATAR_URL_BASE: &str = "https://api.dicebear.com/7.x/avataaars/svg?seed=";

pub const SUPPORTED_COUNTRIES: [&str; 13] = [
    "Morocco",
    "United States",
    "United Kingdom",
    "Canada",
    "Australia",
    "Germany",
    "France",
    "Japan",
    "Brazil",
    "India",
    "United Arab Emirates",
    "Saudi Arabia",
    "Other",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Search,
    NoMatch,
    #[cfg(feature = "studio")]
    ImageGeneration,
    Location,
    Payment,
    Dispatch,
    Validation,
    InvalidState,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Search => "SEARCH_FAILED",
            Self::NoMatch => "NO_MATCH",
            #[cfg(feature = "studio")]
            Self::ImageGeneration => "IMAGE_GENERATION_FAILED",
            Self::Location => "LOCATION_ERROR",
            Self::Payment => "PAYMENT_ERROR",
            Self::Dispatch => "DISPATCH_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::Search | Self::Payment | Self::Dispatch => {
                ErrorSeverity::Transient
            }
            _ => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::Search | Self::Payment | Self::Dispatch
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Search => SEARCH_FAILED_MESSAGE.into(),
            ErrorKind::NoMatch => NO_MATCH_MESSAGE.into(),
            // The studio surfaces whatever the collaborator raised
            #[cfg(feature = "studio")]
            ErrorKind::ImageGeneration => self.message.clone(),
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Payment => "Payment could not be processed. Please try again.".into(),
            ErrorKind::Dispatch => "We couldn't book your ride. Please try again.".into(),
            ErrorKind::Location => {
                "Unable to determine your location. Please check your GPS settings.".into()
            }
            ErrorKind::InvalidState | ErrorKind::Unknown => {
                "An unexpected error occurred. Please try again.".into()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoordinateError {
    #[error("Latitude {0} is out of valid range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("Longitude {0} is out of valid range [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("Coordinate value is not finite (NaN or Infinity)")]
    NonFinite,
}

/// Raw lat/lng pair as it arrives from the platform or goes out to a shell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct LatLon {
    pub lat: f64,
    pub lng: f64,
}

impl LatLon {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn validate(self) -> Result<ValidatedCoordinate, CoordinateError> {
        ValidatedCoordinate::new(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidatedCoordinate {
    lat: f64,
    lng: f64,
}

impl ValidatedCoordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(CoordinateError::LongitudeOutOfRange(lng));
        }
        Ok(Self { lat, lng })
    }

    /// San Francisco, where every rider the platform cannot place ends up.
    #[must_use]
    pub const fn fallback() -> Self {
        Self {
            lat: FALLBACK_LATITUDE,
            lng: FALLBACK_LONGITUDE,
        }
    }

    #[must_use]
    pub const fn lat(self) -> f64 {
        self.lat
    }

    #[must_use]
    pub const fn lng(self) -> f64 {
        self.lng
    }

    #[must_use]
    pub const fn as_tuple(self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

impl From<ValidatedCoordinate> for LatLon {
    fn from(coord: ValidatedCoordinate) -> Self {
        Self {
            lat: coord.lat,
            lng: coord.lng,
        }
    }
}

impl TryFrom<LatLon> for ValidatedCoordinate {
    type Error = CoordinateError;

    fn try_from(value: LatLon) -> Result<Self, Self::Error> {
        Self::new(value.lat, value.lng)
    }
}

/// The single authoritative session status. Every piece of UI and every
/// side-effecting action is gated on this value, and only `App::update`
/// moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    #[default]
    Locating,
    Idle,
    Searching,
    SelectingRide,
    Requesting,
    OnRide,
}

impl RideStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Locating => "locating",
            Self::Idle => "idle",
            Self::Searching => "searching",
            Self::SelectingRide => "selecting_ride",
            Self::Requesting => "requesting",
            Self::OnRide => "on_ride",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Locating => "Locating",
            Self::Idle => "Idle",
            Self::Searching => "Searching",
            Self::SelectingRide => "Selecting Ride",
            Self::Requesting => "Requesting",
            Self::OnRide => "On Ride",
        }
    }

    /// Statuses in which a destination may be held.
    #[must_use]
    pub const fn holds_destination(self) -> bool {
        matches!(self, Self::SelectingRide | Self::Requesting | Self::OnRide)
    }

    #[must_use]
    pub fn valid_transitions(self) -> Vec<Self> {
        match self {
            Self::Locating => vec![Self::Idle],
            Self::Idle => vec![Self::Searching],
            Self::Searching => vec![Self::SelectingRide, Self::Idle],
            Self::SelectingRide => vec![Self::Requesting, Self::Idle],
            Self::Requesting => vec![Self::OnRide],
            Self::OnRide => vec![Self::Idle],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        self.valid_transitions().contains(&to)
    }

    pub fn validate_transition(self, to: Self) -> Result<(), TransitionError> {
        if self == to {
            return Err(TransitionError::SameStatus);
        }
        if !self.can_transition_to(to) {
            return Err(TransitionError::InvalidTransition { from: self, to });
        }
        Ok(())
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot transition to the same status")]
    SameStatus,
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: RideStatus, to: RideStatus },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub country: Option<String>,
}

impl User {
    /// Build the session user the way the demo login does: the display name
    /// is the email local part, the avatar is a generated placeholder.
    #[must_use]
    pub fn from_login(email: &str, country: Option<String>) -> Self {
        let name = email.split('@').next().filter(|s| !s.is_empty());
        Self {
            name: name.unwrap_or("User").to_string(),
            email: email.to_string(),
            avatar_url: Some(format!("{AVATAR_URL_BASE}{email}")),
            country,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub name: String,
    pub address: Option<String>,
    pub map_uri: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub name: String,
    pub rating: f64,
    pub trips: u32,
    pub plate: String,
    pub vehicle_color: String,
}

impl Default for Driver {
    fn default() -> Self {
        Self {
            name: "Michael R.".into(),
            rating: 4.9,
            trips: 2_453,
            plate: "ABD-1234".into(),
            vehicle_color: "White Sedan".into(),
        }
    }
}

/// Seconds until the car arrives. Exists only while the session is `OnRide`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtaCountdown {
    remaining_secs: u64,
}

impl EtaCountdown {
    #[must_use]
    pub const fn seed(eta_minutes: u32) -> Self {
        Self {
            remaining_secs: eta_minutes as u64 * 60,
        }
    }

    pub fn tick(&mut self) {
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
    }

    #[must_use]
    pub const fn remaining_secs(self) -> u64 {
        self.remaining_secs
    }

    #[must_use]
    pub const fn is_elapsed(self) -> bool {
        self.remaining_secs == 0
    }

    #[must_use]
    pub fn formatted(self) -> String {
        format_countdown(self.remaining_secs)
    }
}

#[must_use]
pub fn format_countdown(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(feature = "studio")]
#[derive(Debug, Default)]
pub struct StudioState {
    pub is_generating: bool,
    pub outcome: Option<studio::StudioOutcome>,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct Model {
    pub status: RideStatus,
    pub user: Option<User>,
    pub is_authenticating: bool,
    pub query: String,
    pub location: Option<ValidatedCoordinate>,
    pub destination: Option<Destination>,
    pub selected_tier: RideTier,
    pub show_payment: bool,
    pub payment_in_flight: bool,
    pub ride_id: Option<Uuid>,
    pub driver: Option<Driver>,
    pub countdown: Option<EtaCountdown>,
    pub active_error: Option<AppError>,
    pub search_generation: u64,
    pub assistant: AssistantConfig,
    #[cfg(feature = "studio")]
    pub studio: StudioState,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            status: RideStatus::Locating,
            user: None,
            is_authenticating: false,
            query: String::new(),
            location: None,
            destination: None,
            selected_tier: RideTier::Economy,
            show_payment: false,
            payment_in_flight: false,
            ride_id: None,
            driver: None,
            countdown: None,
            active_error: None,
            search_generation: 0,
            assistant: AssistantConfig::default(),
            #[cfg(feature = "studio")]
            studio: StudioState::default(),
        }
    }
}

impl Model {
    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    #[must_use]
    pub fn country(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.country.as_deref())
    }

    #[must_use]
    pub fn selected_option(&self) -> &'static RideOption {
        ride_option(self.selected_tier)
    }

    #[must_use]
    pub fn selected_price(&self) -> FormattedPrice {
        price_for(self.selected_option(), self.country())
    }

    /// Drop everything tied to the current ride attempt. The caller decides
    /// what status comes next.
    fn clear_ride(&mut self) {
        self.query.clear();
        self.destination = None;
        self.selected_tier = RideTier::Economy;
        self.show_payment = false;
        self.payment_in_flight = false;
        self.ride_id = None;
        self.driver = None;
        self.countdown = None;
    }
}

#[derive(Debug)]
pub enum Event {
    Noop,

    AppStarted {
        assistant: AssistantConfig,
    },

    LoginSubmitted {
        email: String,
        country: Option<String>,
    },
    LoginCompleted {
        email: String,
        country: Option<String>,
    },
    LogoutRequested,

    PositionResolved(capabilities::GeolocationResult),

    QueryChanged {
        text: String,
    },
    SearchSubmitted,
    SearchApiResponse {
        generation: u64,
        result: Box<crux_http::Result<crux_http::Response<GenerateContentResponse>>>,
    },

    RideSelected {
        tier: RideTier,
    },
    ConfirmRequested,
    PaymentDismissed,
    PaySubmitted,
    PaymentResolved(capabilities::PaymentResult),
    DispatchResolved(capabilities::DispatchResult),

    CountdownTick {
        ride_id: Uuid,
    },
    CancelRequested,

    DismissError,

    #[cfg(feature = "studio")]
    GenerateImageRequested {
        prompt: String,
        source: Option<studio::ImageAttachment>,
    },
    #[cfg(feature = "studio")]
    StudioApiResponse(Box<crux_http::Result<crux_http::Response<GenerateContentResponse>>>),
    #[cfg(feature = "studio")]
    ClearStudio,
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::AppStarted { .. } => "app_started",
            Self::LoginSubmitted { .. } => "login_submitted",
            Self::LoginCompleted { .. } => "login_completed",
            Self::LogoutRequested => "logout_requested",
            Self::PositionResolved(_) => "position_resolved",
            Self::QueryChanged { .. } => "query_changed",
            Self::SearchSubmitted => "search_submitted",
            Self::SearchApiResponse { .. } => "search_api_response",
            Self::RideSelected { .. } => "ride_selected",
            Self::ConfirmRequested => "confirm_requested",
            Self::PaymentDismissed => "payment_dismissed",
            Self::PaySubmitted => "pay_submitted",
            Self::PaymentResolved(_) => "payment_resolved",
            Self::DispatchResolved(_) => "dispatch_resolved",
            Self::CountdownTick { .. } => "countdown_tick",
            Self::CancelRequested => "cancel_requested",
            Self::DismissError => "dismiss_error",
            #[cfg(feature = "studio")]
            Self::GenerateImageRequested { .. } => "generate_image_requested",
            #[cfg(feature = "studio")]
            Self::StudioApiResponse(_) => "studio_api_response",
            #[cfg(feature = "studio")]
            Self::ClearStudio => "clear_studio",
        }
    }

    #[must_use]
    #[allow(clippy::match_like_matches_macro)]
    pub const fn is_user_initiated(&self) -> bool {
        match self {
            Self::LoginSubmitted { .. }
            | Self::LogoutRequested
            | Self::QueryChanged { .. }
            | Self::SearchSubmitted
            | Self::RideSelected { .. }
            | Self::ConfirmRequested
            | Self::PaymentDismissed
            | Self::PaySubmitted
            | Self::CancelRequested
            | Self::DismissError => true,
            #[cfg(feature = "studio")]
            Self::GenerateImageRequested { .. } | Self::ClearStudio => true,
            _ => false,
        }
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::Noop
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideOptionView {
    pub tier: RideTier,
    pub name: String,
    pub car_model: String,
    pub icon: String,
    pub image_url: String,
    pub eta_minutes: u32,
    pub price_display: String,
}

impl RideOptionView {
    fn build(option: &RideOption, country: Option<&str>) -> Self {
        Self {
            tier: option.tier,
            name: option.name.to_string(),
            car_model: option.car_model.to_string(),
            icon: option.icon.to_string(),
            image_url: option.image_url.to_string(),
            eta_minutes: option.eta_minutes,
            price_display: price_for(option, country).display,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPromptView {
    pub service_name: String,
    pub price_display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewState {
    Landing {
        is_authenticating: bool,
    },
    Locating,
    Idle {
        greeting: String,
        tagline: String,
        query: String,
    },
    Searching {
        query: String,
    },
    SelectingRide {
        destination: Destination,
        options: Vec<RideOptionView>,
        selected: RideTier,
        payment: Option<PaymentPromptView>,
        payment_in_flight: bool,
    },
    Requesting {
        destination: Destination,
        option: RideOptionView,
    },
    OnRide {
        destination: Destination,
        option: RideOptionView,
        driver: Driver,
        arrival_secs: u64,
        arrival_display: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFacingError {
    pub message: String,
    pub error_code: String,
    pub is_retryable: bool,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            error_code: e.code().to_string(),
            is_retryable: e.is_retryable(),
        }
    }
}

#[cfg(feature = "studio")]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudioView {
    pub is_generating: bool,
    pub image_data_uri: Option<String>,
    pub text: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    pub state: ViewState,
    pub error: Option<UserFacingError>,
    pub user: Option<User>,
    #[cfg(feature = "studio")]
    pub studio: StudioView,
}

pub mod app {
    use super::*;
    use crate::assistant;
    use crate::capabilities::{
        Capabilities, ChargeRequest, DispatchOutput, PaymentOutput, PositionOptions, RideRequest,
    };

    #[derive(Default)]
    pub struct App;

    impl App {
        /// Apply a status transition, refusing (and logging) edges the
        /// lifecycle does not have. Returns whether the status changed.
        fn transition(model: &mut Model, to: RideStatus) -> bool {
            match model.status.validate_transition(to) {
                Ok(()) => {
                    tracing::debug!(from = model.status.as_str(), to = to.as_str(), "transition");
                    model.status = to;
                    true
                }
                Err(e) => {
                    tracing::warn!(
                        from = model.status.as_str(),
                        to = to.as_str(),
                        error = %e,
                        "illegal transition dropped"
                    );
                    false
                }
            }
        }

        fn begin_locating(model: &mut Model, caps: &Capabilities) {
            model.status = RideStatus::Locating;
            caps.geolocation
                .current_position(PositionOptions::default(), Event::PositionResolved);
        }

        fn send_search_request(model: &Model, caps: &Capabilities) {
            let request = assistant::search_request(model.query.trim(), model.location);
            let body = match serde_json::to_vec(&request) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(error = %e, "search request serialization failed");
                    return;
                }
            };

            let url = model
                .assistant
                .generate_content_url(&model.assistant.search_model);
            let generation = model.search_generation;

            caps.http
                .post(&url)
                .header("content-type", "application/json")
                .header(assistant::API_KEY_HEADER, model.assistant.expose_key())
                .body(body)
                .expect_json::<GenerateContentResponse>()
                .send(move |result| Event::SearchApiResponse {
                    generation,
                    result: Box::new(result),
                });
        }

        fn handle_search_response(
            model: &mut Model,
            result: crux_http::Result<crux_http::Response<GenerateContentResponse>>,
        ) {
            let outcome = match result {
                Ok(mut response) if response.status().is_success() => response.take_body(),
                Ok(response) => {
                    tracing::warn!(status = %response.status(), "search request failed");
                    model.set_error(
                        AppError::new(ErrorKind::Search, "assistant returned an error status")
                            .with_internal(format!("status {}", response.status())),
                    );
                    Self::transition(model, RideStatus::Idle);
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "search transport failed");
                    model.set_error(
                        AppError::new(ErrorKind::Search, "assistant call failed")
                            .with_internal(e.to_string()),
                    );
                    Self::transition(model, RideStatus::Idle);
                    return;
                }
            };

            match outcome.as_ref().and_then(assistant::destination_from_response) {
                Some(destination) => {
                    tracing::info!(name = %destination.name, "destination resolved");
                    model.destination = Some(destination);
                    model.selected_tier = RideTier::Economy;
                    Self::transition(model, RideStatus::SelectingRide);
                }
                None => {
                    tracing::info!("search produced no usable destination");
                    model.set_error(AppError::new(ErrorKind::NoMatch, "no destination matched"));
                    Self::transition(model, RideStatus::Idle);
                }
            }
        }

        #[cfg(feature = "studio")]
        fn send_studio_request(
            model: &Model,
            caps: &Capabilities,
            prompt: &str,
            source: Option<(String, String)>,
        ) {
            let request = assistant::image_request(prompt, source);
            let body = match serde_json::to_vec(&request) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(error = %e, "studio request serialization failed");
                    return;
                }
            };

            let url = model
                .assistant
                .generate_content_url(&model.assistant.image_model);

            caps.http
                .post(&url)
                .header("content-type", "application/json")
                .header(assistant::API_KEY_HEADER, model.assistant.expose_key())
                .body(body)
                .expect_json::<GenerateContentResponse>()
                .send(|result| Event::StudioApiResponse(Box::new(result)));
        }

        #[cfg(feature = "studio")]
        fn handle_studio_response(
            model: &mut Model,
            result: crux_http::Result<crux_http::Response<GenerateContentResponse>>,
        ) {
            model.studio.is_generating = false;

            let body = match result {
                Ok(mut response) if response.status().is_success() => response.take_body(),
                Ok(response) => {
                    model.studio.error = Some(format!(
                        "Image generation failed (status {})",
                        response.status()
                    ));
                    return;
                }
                Err(e) => {
                    model.studio.error = Some(e.to_string());
                    return;
                }
            };

            let Some(body) = body else {
                model.studio.error = Some("Image generation returned nothing".into());
                return;
            };

            let parts = assistant::generated_parts(&body);
            let image = match parts.image.as_ref().map(studio::decode_generated) {
                Some(Ok(image)) => Some(image),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "generated image rejected");
                    model.studio.error = Some(e.to_string());
                    return;
                }
                None => None,
            };

            let outcome = studio::StudioOutcome {
                image,
                text: parts.text,
            };

            if outcome.is_empty() {
                model.studio.error = Some("No content was generated. Please try again.".into());
            } else {
                model.studio.outcome = Some(outcome);
            }
        }

        fn begin_ride_request(model: &mut Model, caps: &Capabilities) {
            let Some(destination_name) = model.destination.as_ref().map(|d| d.name.clone()) else {
                tracing::warn!("ride requested without a destination");
                return;
            };

            let ride_id = Uuid::new_v4();
            model.ride_id = Some(ride_id);

            caps.dispatch.request_ride(
                RideRequest {
                    ride_id,
                    tier: model.selected_tier,
                    destination_name,
                },
                Event::DispatchResolved,
            );
        }

        fn arm_countdown_tick(caps: &Capabilities, ride_id: Uuid) {
            caps.time
                .notify_after(COUNTDOWN_TICK_MS, move || Event::CountdownTick { ride_id });
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            let event_name = event.name();
            if event.is_user_initiated() {
                tracing::info!(event = event_name, status = model.status.as_str(), "user action");
            } else {
                tracing::debug!(event = event_name, status = model.status.as_str(), "event");
            }

            match event {
                Event::Noop => {}

                Event::AppStarted { assistant } => {
                    model.assistant = assistant;
                    caps.render.render();
                }

                Event::LoginSubmitted { email, country } => {
                    model.is_authenticating = true;
                    caps.time
                        .notify_after(LOGIN_DELAY_MS, move || Event::LoginCompleted {
                            email,
                            country,
                        });
                    caps.render.render();
                }

                Event::LoginCompleted { email, country } => {
                    model.is_authenticating = false;
                    model.user = Some(User::from_login(&email, country));
                    model.clear_ride();
                    model.clear_error();
                    Self::begin_locating(model, caps);
                    caps.render.render();
                }

                Event::LogoutRequested => {
                    // Logout discards the whole session; only app-level
                    // configuration survives.
                    let assistant = model.assistant.clone();
                    *model = Model {
                        assistant,
                        ..Model::default()
                    };
                    caps.render.render();
                }

                Event::PositionResolved(result) => {
                    if model.status != RideStatus::Locating {
                        tracing::debug!("position resolved outside Locating, dropped");
                        return;
                    }

                    // This lookup never fails its caller: anything short of a
                    // valid fix becomes the fallback coordinate.
                    let coord = match result {
                        Ok(position) => {
                            match ValidatedCoordinate::new(position.latitude, position.longitude) {
                                Ok(coord) => coord,
                                Err(e) => {
                                    tracing::warn!(error = %e, "device returned invalid coordinates");
                                    ValidatedCoordinate::fallback()
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "geolocation unavailable, using fallback");
                            ValidatedCoordinate::fallback()
                        }
                    };

                    model.location = Some(coord);
                    Self::transition(model, RideStatus::Idle);
                    caps.render.render();
                }

                Event::QueryChanged { text } => {
                    model.query = text;
                    if model.status == RideStatus::SelectingRide {
                        model.destination = None;
                        Self::transition(model, RideStatus::Idle);
                    }
                    caps.render.render();
                }

                Event::SearchSubmitted => {
                    if model.query.trim().is_empty() {
                        return;
                    }

                    match model.status {
                        RideStatus::SelectingRide => {
                            model.destination = None;
                            Self::transition(model, RideStatus::Idle);
                        }
                        RideStatus::Idle | RideStatus::Searching => {}
                        _ => {
                            tracing::warn!(status = model.status.as_str(), "search dropped");
                            return;
                        }
                    }

                    model.clear_error();
                    model.destination = None;
                    model.search_generation += 1;
                    if model.status == RideStatus::Idle {
                        Self::transition(model, RideStatus::Searching);
                    }
                    Self::send_search_request(model, caps);
                    caps.render.render();
                }

                Event::SearchApiResponse { generation, result } => {
                    if generation != model.search_generation {
                        tracing::debug!(
                            generation,
                            current = model.search_generation,
                            "stale search response discarded"
                        );
                        return;
                    }
                    if model.status != RideStatus::Searching {
                        tracing::debug!(status = model.status.as_str(), "search response dropped");
                        return;
                    }

                    Self::handle_search_response(model, *result);
                    caps.render.render();
                }

                Event::RideSelected { tier } => {
                    if model.status == RideStatus::SelectingRide {
                        model.selected_tier = tier;
                        caps.render.render();
                    }
                }

                Event::ConfirmRequested => {
                    if model.status == RideStatus::SelectingRide && model.destination.is_some() {
                        model.show_payment = true;
                        caps.render.render();
                    }
                }

                Event::PaymentDismissed => {
                    if !model.payment_in_flight {
                        model.show_payment = false;
                        caps.render.render();
                    }
                }

                Event::PaySubmitted => {
                    if model.status != RideStatus::SelectingRide
                        || !model.show_payment
                        || model.payment_in_flight
                    {
                        return;
                    }

                    model.payment_in_flight = true;
                    let price = model.selected_price();
                    caps.payment.charge(
                        ChargeRequest {
                            tier: model.selected_tier,
                            amount: price.amount,
                            currency_code: price.currency_code,
                            formatted_amount: price.display,
                        },
                        Event::PaymentResolved,
                    );
                    caps.render.render();
                }

                Event::PaymentResolved(result) => {
                    if model.status != RideStatus::SelectingRide || !model.payment_in_flight {
                        tracing::debug!("payment result dropped");
                        return;
                    }

                    model.payment_in_flight = false;
                    model.show_payment = false;

                    match result {
                        Ok(PaymentOutput::Confirmed { receipt_id }) => {
                            tracing::info!(receipt_id = %receipt_id, "payment confirmed");
                            Self::transition(model, RideStatus::Requesting);
                            Self::begin_ride_request(model, caps);
                        }
                        Ok(PaymentOutput::Cancelled) => {
                            tracing::info!("payment sheet dismissed");
                        }
                        Err(e) => {
                            model.set_error(
                                AppError::new(ErrorKind::Payment, "charge failed")
                                    .with_internal(e.to_string()),
                            );
                        }
                    }
                    caps.render.render();
                }

                Event::DispatchResolved(result) => {
                    let Ok(DispatchOutput::Booked { ride_id, driver }) = result else {
                        if model.status == RideStatus::Requesting {
                            model.set_error(AppError::new(
                                ErrorKind::Dispatch,
                                "ride could not be booked",
                            ));
                            model.clear_ride();
                            model.status = RideStatus::Idle;
                            caps.render.render();
                        }
                        return;
                    };

                    if model.status != RideStatus::Requesting || model.ride_id != Some(ride_id) {
                        tracing::debug!(%ride_id, "booking for a dead ride id dropped");
                        return;
                    }

                    model.driver = Some(driver);
                    model.countdown = Some(EtaCountdown::seed(model.selected_option().eta_minutes));
                    Self::transition(model, RideStatus::OnRide);
                    Self::arm_countdown_tick(caps, ride_id);
                    caps.render.render();
                }

                Event::CountdownTick { ride_id } => {
                    if model.status != RideStatus::OnRide || model.ride_id != Some(ride_id) {
                        tracing::debug!(%ride_id, "tick for a dead ride dropped");
                        return;
                    }

                    if let Some(countdown) = &mut model.countdown {
                        countdown.tick();
                    }
                    Self::arm_countdown_tick(caps, ride_id);
                    caps.render.render();
                }

                Event::CancelRequested => {
                    if model.status != RideStatus::OnRide {
                        tracing::warn!(status = model.status.as_str(), "cancel dropped");
                        return;
                    }

                    model.clear_ride();
                    Self::transition(model, RideStatus::Idle);
                    caps.render.render();
                }

                Event::DismissError => {
                    model.clear_error();
                    caps.render.render();
                }

                #[cfg(feature = "studio")]
                Event::GenerateImageRequested { prompt, source } => {
                    if prompt.trim().is_empty() {
                        return;
                    }

                    let payload = match &source {
                        Some(attachment) => match attachment.validate() {
                            Ok(()) => Some(attachment.to_inline_payload()),
                            Err(e) => {
                                model.studio.error = Some(e.to_string());
                                caps.render.render();
                                return;
                            }
                        },
                        None => None,
                    };

                    model.studio.is_generating = true;
                    model.studio.error = None;
                    Self::send_studio_request(model, caps, prompt.trim(), payload);
                    caps.render.render();
                }

                #[cfg(feature = "studio")]
                Event::StudioApiResponse(result) => {
                    Self::handle_studio_response(model, *result);
                    caps.render.render();
                }

                #[cfg(feature = "studio")]
                Event::ClearStudio => {
                    model.studio = StudioState::default();
                    caps.render.render();
                }
            }
        }

        fn view(&self, model: &Model) -> ViewModel {
            let country = model.country();

            let state = if let Some(user) = &model.user {
                match model.status {
                    RideStatus::Locating => ViewState::Locating,

                    RideStatus::Idle => ViewState::Idle {
                        greeting: format!("Hello, {}.", user.name),
                        tagline: format!(
                            "Ready to go somewhere in {}?",
                            user.country.as_deref().unwrap_or("your city")
                        ),
                        query: model.query.clone(),
                    },

                    RideStatus::Searching => ViewState::Searching {
                        query: model.query.clone(),
                    },

                    RideStatus::SelectingRide => match &model.destination {
                        Some(destination) => {
                            let payment = model.show_payment.then(|| PaymentPromptView {
                                service_name: model.selected_option().name.to_string(),
                                price_display: model.selected_price().display,
                            });

                            ViewState::SelectingRide {
                                destination: destination.clone(),
                                options: RIDE_CATALOG
                                    .iter()
                                    .map(|o| RideOptionView::build(o, country))
                                    .collect(),
                                selected: model.selected_tier,
                                payment,
                                payment_in_flight: model.payment_in_flight,
                            }
                        }
                        None => ViewState::Idle {
                            greeting: format!("Hello, {}.", user.name),
                            tagline: "Where to?".into(),
                            query: model.query.clone(),
                        },
                    },

                    RideStatus::Requesting => match &model.destination {
                        Some(destination) => ViewState::Requesting {
                            destination: destination.clone(),
                            option: RideOptionView::build(model.selected_option(), country),
                        },
                        None => ViewState::Locating,
                    },

                    RideStatus::OnRide => {
                        match (&model.destination, &model.driver, model.countdown) {
                            (Some(destination), Some(driver), Some(countdown)) => {
                                ViewState::OnRide {
                                    destination: destination.clone(),
                                    option: RideOptionView::build(model.selected_option(), country),
                                    driver: driver.clone(),
                                    arrival_secs: countdown.remaining_secs(),
                                    arrival_display: countdown.formatted(),
                                }
                            }
                            _ => ViewState::Locating,
                        }
                    }
                }
            } else {
                ViewState::Landing {
                    is_authenticating: model.is_authenticating,
                }
            };

            ViewModel {
                state,
                error: model.active_error.as_ref().map(UserFacingError::from),
                user: model.user.clone(),
                #[cfg(feature = "studio")]
                studio: StudioView {
                    is_generating: model.studio.is_generating,
                    image_data_uri: model
                        .studio
                        .outcome
                        .as_ref()
                        .and_then(|o| o.image.as_ref())
                        .map(studio::GeneratedImage::to_data_uri),
                    text: model.studio.outcome.as_ref().and_then(|o| o.text.clone()),
                    error: model.studio.error.clone(),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod status_tests {
        use super::*;

        #[test]
        fn initial_status_is_locating() {
            assert_eq!(RideStatus::default(), RideStatus::Locating);
        }

        #[test]
        fn lifecycle_is_a_path_with_explicit_reset_edges() {
            assert_eq!(RideStatus::Locating.valid_transitions(), vec![RideStatus::Idle]);
            assert_eq!(RideStatus::Idle.valid_transitions(), vec![RideStatus::Searching]);
            assert_eq!(
                RideStatus::Searching.valid_transitions(),
                vec![RideStatus::SelectingRide, RideStatus::Idle]
            );
            assert_eq!(
                RideStatus::SelectingRide.valid_transitions(),
                vec![RideStatus::Requesting, RideStatus::Idle]
            );
            assert_eq!(
                RideStatus::Requesting.valid_transitions(),
                vec![RideStatus::OnRide]
            );
            assert_eq!(RideStatus::OnRide.valid_transitions(), vec![RideStatus::Idle]);
        }

        #[test]
        fn illegal_edges_are_rejected() {
            assert!(matches!(
                RideStatus::Idle.validate_transition(RideStatus::OnRide),
                Err(TransitionError::InvalidTransition { .. })
            ));
            assert!(matches!(
                RideStatus::Idle.validate_transition(RideStatus::Idle),
                Err(TransitionError::SameStatus)
            ));
            assert!(RideStatus::Searching
                .validate_transition(RideStatus::Idle)
                .is_ok());
        }

        #[test]
        fn destination_holding_statuses() {
            assert!(RideStatus::SelectingRide.holds_destination());
            assert!(RideStatus::Requesting.holds_destination());
            assert!(RideStatus::OnRide.holds_destination());
            assert!(!RideStatus::Idle.holds_destination());
            assert!(!RideStatus::Searching.holds_destination());
            assert!(!RideStatus::Locating.holds_destination());
        }
    }

    mod countdown_tests {
        use super::*;

        #[test]
        fn seed_converts_minutes_to_seconds() {
            let countdown = EtaCountdown::seed(4);
            assert_eq!(countdown.remaining_secs(), 240);
            assert_eq!(countdown.formatted(), "4:00");
        }

        #[test]
        fn tick_decrements_and_floors_at_zero() {
            let mut countdown = EtaCountdown::seed(0);
            assert!(countdown.is_elapsed());
            countdown.tick();
            assert_eq!(countdown.remaining_secs(), 0);

            let mut countdown = EtaCountdown::seed(1);
            for _ in 0..59 {
                countdown.tick();
            }
            assert_eq!(countdown.formatted(), "0:01");
            countdown.tick();
            assert_eq!(countdown.formatted(), "0:00");
            countdown.tick();
            assert_eq!(countdown.formatted(), "0:00");
        }

        #[test]
        fn countdown_never_increases() {
            let mut countdown = EtaCountdown::seed(7);
            let mut previous = countdown.remaining_secs();
            for _ in 0..500 {
                countdown.tick();
                assert!(countdown.remaining_secs() <= previous);
                previous = countdown.remaining_secs();
            }
        }

        #[test]
        fn formatting_pads_seconds() {
            assert_eq!(format_countdown(0), "0:00");
            assert_eq!(format_countdown(9), "0:09");
            assert_eq!(format_countdown(60), "1:00");
            assert_eq!(format_countdown(125), "2:05");
            assert_eq!(format_countdown(540), "9:00");
        }
    }

    mod coordinate_tests {
        use super::*;

        #[test]
        fn in_range_coordinates_validate() {
            assert!(ValidatedCoordinate::new(0.0, 0.0).is_ok());
            assert!(ValidatedCoordinate::new(90.0, 180.0).is_ok());
            assert!(ValidatedCoordinate::new(-90.0, -180.0).is_ok());
        }

        #[test]
        fn out_of_range_and_non_finite_are_rejected() {
            assert!(matches!(
                ValidatedCoordinate::new(91.0, 0.0),
                Err(CoordinateError::LatitudeOutOfRange(_))
            ));
            assert!(matches!(
                ValidatedCoordinate::new(0.0, -181.0),
                Err(CoordinateError::LongitudeOutOfRange(_))
            ));
            assert!(matches!(
                ValidatedCoordinate::new(f64::NAN, 0.0),
                Err(CoordinateError::NonFinite)
            ));
        }

        #[test]
        fn fallback_is_san_francisco() {
            let coord = ValidatedCoordinate::fallback();
            assert_eq!(coord.as_tuple(), (37.7749, -122.4194));
        }
    }

    mod user_tests {
        use super::*;

        #[test]
        fn login_derives_name_from_email_local_part() {
            let user = User::from_login("sam@example.com", Some("Japan".into()));
            assert_eq!(user.name, "sam");
            assert_eq!(user.country.as_deref(), Some("Japan"));
            assert_eq!(
                user.avatar_url.as_deref(),
                Some("https://api.dicebear.com/7.x/avataaars/svg?seed=sam@example.com")
            );
        }

        #[test]
        fn empty_local_part_falls_back_to_generic_name() {
            assert_eq!(User::from_login("@example.com", None).name, "User");
            assert_eq!(User::from_login("", None).name, "User");
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn lookup_failures_have_distinct_user_messages() {
            let failed = AppError::new(ErrorKind::Search, "boom");
            let no_match = AppError::new(ErrorKind::NoMatch, "nothing");
            assert_eq!(failed.user_facing_message(), SEARCH_FAILED_MESSAGE);
            assert_eq!(no_match.user_facing_message(), NO_MATCH_MESSAGE);
            assert_ne!(failed.user_facing_message(), no_match.user_facing_message());
        }

        #[test]
        fn codes_are_stable() {
            assert_eq!(ErrorKind::Search.code(), "SEARCH_FAILED");
            assert_eq!(ErrorKind::NoMatch.code(), "NO_MATCH");
            assert_eq!(ErrorKind::Location.code(), "LOCATION_ERROR");
        }

        #[test]
        fn internal_detail_shows_in_display_only() {
            let error = AppError::new(ErrorKind::Search, "call failed").with_internal("status 502");
            assert!(error.to_string().contains("status 502"));
            assert!(!error.user_facing_message().contains("502"));
        }
    }

    mod model_tests {
        use super::*;

        #[test]
        fn default_model_is_a_fresh_session() {
            let model = Model::default();
            assert_eq!(model.status, RideStatus::Locating);
            assert!(model.user.is_none());
            assert!(model.destination.is_none());
            assert!(model.countdown.is_none());
            assert_eq!(model.selected_tier, RideTier::Economy);
            assert_eq!(model.search_generation, 0);
        }

        #[test]
        fn selected_price_follows_the_user_country() {
            let mut model = Model::default();
            assert_eq!(model.selected_price().display, "$ 12.50");

            model.user = Some(User::from_login("r@example.com", Some("Morocco".into())));
            assert_eq!(model.selected_price().display, "DH 125.00");

            model.selected_tier = RideTier::Premium;
            assert_eq!(model.selected_price().display, "DH 280.00");
        }

        #[test]
        fn clear_ride_drops_everything_ride_scoped() {
            let mut model = Model::default();
            model.query = "airport".into();
            model.destination = Some(Destination {
                name: "SFO".into(),
                address: None,
                map_uri: None,
                description: None,
            });
            model.selected_tier = RideTier::Xl;
            model.show_payment = true;
            model.ride_id = Some(Uuid::new_v4());
            model.driver = Some(Driver::default());
            model.countdown = Some(EtaCountdown::seed(4));

            model.clear_ride();

            assert!(model.query.is_empty());
            assert!(model.destination.is_none());
            assert_eq!(model.selected_tier, RideTier::Economy);
            assert!(!model.show_payment);
            assert!(model.ride_id.is_none());
            assert!(model.driver.is_none());
            assert!(model.countdown.is_none());
        }
    }

    mod event_tests {
        use super::*;

        #[test]
        fn default_event_is_noop() {
            assert!(matches!(Event::default(), Event::Noop));
        }

        #[test]
        fn event_names() {
            assert_eq!(Event::Noop.name(), "noop");
            assert_eq!(Event::SearchSubmitted.name(), "search_submitted");
            assert_eq!(Event::CancelRequested.name(), "cancel_requested");
        }

        #[test]
        fn user_initiated_classification() {
            assert!(Event::SearchSubmitted.is_user_initiated());
            assert!(Event::CancelRequested.is_user_initiated());
            assert!(!Event::Noop.is_user_initiated());
            assert!(!Event::CountdownTick {
                ride_id: Uuid::new_v4()
            }
            .is_user_initiated());
        }
    }
}
