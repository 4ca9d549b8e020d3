mod dispatch;
mod geolocation;
mod payment;
mod time;

pub use self::dispatch::{
    Dispatch, DispatchError, DispatchOperation, DispatchOutput, DispatchResult, RideRequest,
};
pub use self::geolocation::{
    Geolocation, GeolocationError, GeolocationOperation, GeolocationResult, Position,
    PositionOptions,
};
pub use self::payment::{
    ChargeRequest, Payment, PaymentError, PaymentOperation, PaymentOutput, PaymentResult,
};
pub use self::time::{Time, TimeOperation, TimeOutput};

// Render comes straight from Crux; it already does everything we need to
// trigger view updates. Http likewise carries the assistant calls.
pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::App;
use crate::Event;

pub type AppHttp = Http<Event>;
pub type AppRender = Render<Event>;
pub type AppGeolocation = Geolocation<Event>;
pub type AppPayment = Payment<Event>;
pub type AppDispatch = Dispatch<Event>;
pub type AppTime = Time<Event>;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
    pub geolocation: Geolocation<Event>,
    pub payment: Payment<Event>,
    pub dispatch: Dispatch<Event>,
    pub time: Time<Event>,
}
