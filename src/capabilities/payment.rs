use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fare::RideTier;

/// What the payment sheet is asked to collect. Amounts are already converted
/// to the rider's display currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeRequest {
    pub tier: RideTier,
    pub amount: f64,
    pub currency_code: String,
    pub formatted_amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PaymentOperation {
    Charge(ChargeRequest),
}

impl Operation for PaymentOperation {
    type Output = PaymentResult;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentOutput {
    Confirmed { receipt_id: String },
    /// The rider closed the sheet without paying. Not an error.
    Cancelled,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentError {
    #[error("payment processor unavailable: {reason}")]
    Unavailable { reason: String },
}

pub type PaymentResult = Result<PaymentOutput, PaymentError>;

pub struct Payment<Ev> {
    context: CapabilityContext<PaymentOperation, Ev>,
}

impl<Ev> Capability<Ev> for Payment<Ev> {
    type Operation = PaymentOperation;
    type MappedSelf<MappedEv> = Payment<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static,
    {
        Payment::new(self.context.map_event(f))
    }
}

impl<Ev> Payment<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<PaymentOperation, Ev>) -> Self {
        Self { context }
    }

    /// Run one charge through the processor. The demo shell confirms after a
    /// fixed simulated delay; a real shell would drive an actual payment
    /// sheet behind the same protocol.
    pub fn charge<F>(&self, request: ChargeRequest, make_event: F)
    where
        F: FnOnce(PaymentResult) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(PaymentOperation::Charge(request))
                .await;
            context.update_app(make_event(result));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_request_round_trips_through_serde() {
        let request = ChargeRequest {
            tier: RideTier::Economy,
            amount: 125.0,
            currency_code: "MAD".into(),
            formatted_amount: "DH 125.00".into(),
        };
        let json = serde_json::to_string(&request).unwrap();
        let back: ChargeRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request, back);
    }

    #[test]
    fn cancelled_is_not_an_error() {
        let result: PaymentResult = Ok(PaymentOutput::Cancelled);
        assert!(result.is_ok());
    }
}
