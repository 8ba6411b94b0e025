use tracing::{debug, info};

use super::Orchestrator;
use crate::config::WakePolicy;
use crate::keyword::{classify, FlowKind};

/// What `dispatch` did with a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// No flow indicator in the keyword.
    Ignored,
    /// A flow of this kind was already running; the keyword was dropped.
    Dropped(FlowKind),
    /// The flow ran to completion (successfully or not).
    Completed(FlowKind),
}

impl Orchestrator {
    /// Classify a keyword and run the selected flow to completion.
    pub async fn dispatch(&self, keyword: &str) -> Dispatch {
        let Some(flow) = classify(keyword) else {
            debug!(keyword, "keyword ignored");
            return Dispatch::Ignored;
        };
        info!(keyword, flow = %flow, "keyword dispatched");

        match flow {
            FlowKind::Wake => {
                let _permit = match self.inner.config.wake_policy {
                    WakePolicy::Serialize => match self.inner.wake_gate.try_acquire() {
                        Ok(permit) => Some(permit),
                        Err(_) => {
                            info!(keyword, "wake flow already running, keyword dropped");
                            return Dispatch::Dropped(flow);
                        }
                    },
                    WakePolicy::Overlap => None,
                };
                self.run_wake_flow().await;
            }
            FlowKind::Query => {
                if !self.inner.state.try_enter_consent() {
                    info!(keyword, "consent flow already active, keyword dropped");
                    return Dispatch::Dropped(flow);
                }
                self.inner.poller.cancel_all();
                self.notify();
                self.run_consent_flow().await;
            }
        }
        Dispatch::Completed(flow)
    }
}
