// REST client modules
//
// Hand-written client for the tracking backend's REST resources.

pub mod client;
pub mod collar;
pub mod location;
pub mod notifications;
pub mod pets;
pub mod sensor;

pub use client::RestClient;
