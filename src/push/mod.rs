//! Push delivery: quiet hours, suppression policy and the outbound transport.

mod dispatcher;
mod http_transport;
mod quiet_hours;
mod transport;

pub use dispatcher::{suppression, DispatchDecision, PushDispatcher, SuppressReason};
pub use http_transport::HttpPushTransport;
pub use quiet_hours::{is_quiet, is_quiet_at};
pub use transport::{
    DeliveryOutcome, DeliveryReport, PushData, PushMessage, PushTransport, TransportError, Urgency,
};
