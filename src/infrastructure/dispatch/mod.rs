// Worker agent transports

pub mod http_agent_dispatcher;

pub use http_agent_dispatcher::HttpAgentDispatcher;
