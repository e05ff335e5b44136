pub mod auth;
pub mod client;
pub mod endpoint;

pub use auth::AccessToken;
pub use client::NetilionClient;
pub use endpoint::Endpoint;
