use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::fare::RideTier;
use crate::Driver;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RideRequest {
    pub ride_id: Uuid,
    pub tier: RideTier,
    pub destination_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DispatchOperation {
    RequestRide(RideRequest),
}

impl Operation for DispatchOperation {
    type Output = DispatchResult;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DispatchOutput {
    Booked { ride_id: Uuid, driver: Driver },
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no drivers available: {reason}")]
    NoDrivers { reason: String },
}

pub type DispatchResult = Result<DispatchOutput, DispatchError>;

pub struct Dispatch<Ev> {
    context: CapabilityContext<DispatchOperation, Ev>,
}

impl<Ev> Capability<Ev> for Dispatch<Ev> {
    type Operation = DispatchOperation;
    type MappedSelf<MappedEv> = Dispatch<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static,
    {
        Dispatch::new(self.context.map_event(f))
    }
}

impl<Ev> Dispatch<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<DispatchOperation, Ev>) -> Self {
        Self { context }
    }

    /// Book a ride. Uncancelable once issued: the shell always answers, and
    /// the app decides whether the answer still matches a live ride id.
    pub fn request_ride<F>(&self, request: RideRequest, make_event: F)
    where
        F: FnOnce(DispatchResult) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(DispatchOperation::RequestRide(request))
                .await;
            context.update_app(make_event(result));
        });
    }
}
