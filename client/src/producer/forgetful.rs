use memq_common::{intake::BrokerHandle, request::PushRequest};
use tracing::debug;

use crate::open_state::OpenState;

/// Producer without acknowledgment tracking, events are fire-and-forget
pub struct ForgetfulProducer<E> {
    open_state: OpenState<E>,
}

impl<E> ForgetfulProducer<E> {
    pub(crate) fn new(broker: &BrokerHandle<E>) -> Self {
        Self {
            open_state: OpenState::new(broker.events().clone()),
        }
    }

    pub async fn publish(&self, event: E) -> bool {
        self.open_state.publish(PushRequest::new(event)).await
    }

    pub fn try_publish(&self, event: E) -> bool {
        self.open_state.try_publish(PushRequest::new(event))
    }

    /// Close the producer. Nothing is tracked, so nothing is ever reported as removed.
    pub fn cancel(&self) -> usize {
        if self.open_state.close() {
            debug!("forgetful producer closed");
        }
        0
    }
}
