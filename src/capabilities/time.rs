use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeOperation {
    NotifyAfter { millis: u64 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeOutput {
    Elapsed,
}

impl Operation for TimeOperation {
    type Output = TimeOutput;
}

/// Deadline notifications. Each request fires exactly once; recurring ticks
/// are built by re-arming from the handler, which is what lets a tick loop
/// die naturally when the app stops re-arming it.
pub struct Time<Ev> {
    context: CapabilityContext<TimeOperation, Ev>,
}

impl<Ev> Capability<Ev> for Time<Ev> {
    type Operation = TimeOperation;
    type MappedSelf<MappedEv> = Time<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static,
    {
        Time::new(self.context.map_event(f))
    }
}

impl<Ev> Time<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<TimeOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn notify_after<F>(&self, millis: u64, make_event: F)
    where
        F: FnOnce() -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let TimeOutput::Elapsed = context
                .request_from_shell(TimeOperation::NotifyAfter { millis })
                .await;
            context.update_app(make_event());
        });
    }
}
