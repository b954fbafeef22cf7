// Reasoning gateway adapters

pub mod portkey_gateway;

pub use portkey_gateway::PortkeyGateway;
