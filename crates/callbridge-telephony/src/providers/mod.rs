//! One [`ProviderFraming`](crate::framing::ProviderFraming) implementation
//! per supported WebSocket telephony provider.

pub mod asterisk;
pub mod exotel;
pub mod twilio;
pub mod vonage;

pub use asterisk::AsteriskFraming;
pub use exotel::ExotelFraming;
pub use twilio::TwilioFraming;
pub use vonage::VonageFraming;
