//! Outbound messaging
//!
//! `gateway` talks to the external messaging provider; `receiver` keeps the
//! one-row-per-entity mapping between platform entities and provider
//! contacts; `onboarding` wires provisioned users into both.

mod gateway;
mod onboarding;
mod receiver;

pub use gateway::{GlificGateway, MessageGateway, NoopGateway, PageRequest};
pub use onboarding::onboard_user;
pub use receiver::save_receiver_if_required;
