use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Options passed through to the platform position API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout_ms: u64,
    pub maximum_age_ms: u64,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout_ms: 10_000,
            maximum_age_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum GeolocationOperation {
    GetCurrentPosition(PositionOptions),
}

impl Operation for GeolocationOperation {
    type Output = GeolocationResult;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: Option<f64>,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("location permission denied by user")]
    PermissionDenied,

    #[error("position unavailable: {reason}")]
    PositionUnavailable { reason: String },

    #[error("position request timed out")]
    Timeout,

    #[error("geolocation not supported on this platform")]
    Unsupported,
}

pub type GeolocationResult = Result<Position, GeolocationError>;

pub struct Geolocation<Ev> {
    context: CapabilityContext<GeolocationOperation, Ev>,
}

impl<Ev> Capability<Ev> for Geolocation<Ev> {
    type Operation = GeolocationOperation;
    type MappedSelf<MappedEv> = Geolocation<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static,
    {
        Geolocation::new(self.context.map_event(f))
    }
}

impl<Ev> Geolocation<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<GeolocationOperation, Ev>) -> Self {
        Self { context }
    }

    /// One-shot position fix. The shell resolves exactly once, with either a
    /// position or the platform error; retries are the caller's business.
    pub fn current_position<F>(&self, options: PositionOptions, make_event: F)
    where
        F: FnOnce(GeolocationResult) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(GeolocationOperation::GetCurrentPosition(options))
                .await;
            context.update_app(make_event(result));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_the_device_contract() {
        let options = PositionOptions::default();
        assert!(options.enable_high_accuracy);
        assert_eq!(options.timeout_ms, 10_000);
        assert_eq!(options.maximum_age_ms, 0);
    }

    #[test]
    fn operation_round_trips_through_serde() {
        let op = GeolocationOperation::GetCurrentPosition(PositionOptions::default());
        let json = serde_json::to_string(&op).unwrap();
        let back: GeolocationOperation = serde_json::from_str(&json).unwrap();
        assert_eq!(op, back);
    }

    #[test]
    fn errors_serialize_for_the_shell_boundary() {
        let err = GeolocationError::PositionUnavailable {
            reason: "no fix".into(),
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: GeolocationError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
