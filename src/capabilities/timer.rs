//! One-shot delay capability driving the chat poll cadence. The shell owns
//! the actual clock; the core owns cancellation via generation-scoped ids.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data")]
pub enum TimerOperation {
    /// Resolve with `Fired` after `millis`, or `Cancelled` if cancelled first.
    Start { id: u64, millis: u64 },
    /// Fire-and-forget: cancels a pending `Start` with the same id.
    Cancel { id: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TimerOutput {
    Fired { id: u64 },
    Cancelled { id: u64 },
}

impl TimerOutput {
    #[must_use]
    pub const fn id(self) -> u64 {
        match self {
            Self::Fired { id } | Self::Cancelled { id } => id,
        }
    }
}

impl Operation for TimerOperation {
    type Output = TimerOutput;
}

pub struct Timer<Ev> {
    context: CapabilityContext<TimerOperation, Ev>,
}

impl<Ev> Capability<Ev> for Timer<Ev> {
    type Operation = TimerOperation;
    type MappedSelf<MappedEv> = Timer<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static,
    {
        Timer::new(self.context.map_event(f))
    }
}

impl<Ev> Timer<Ev>
where
    Ev: 'static,
{
    #[must_use]
    pub fn new(context: CapabilityContext<TimerOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn after<F>(&self, id: u64, millis: u64, make_event: F)
    where
        F: FnOnce(TimerOutput) -> Ev + Send + 'static,
        Ev: Send,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let output = context
                .request_from_shell(TimerOperation::Start { id, millis })
                .await;
            context.update_app(make_event(output));
        });
    }

    pub fn cancel(&self, id: u64)
    where
        Ev: Send,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            context.notify_shell(TimerOperation::Cancel { id }).await;
        });
    }
}
