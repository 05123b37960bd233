pub mod console;
pub mod events;
pub mod runner;

pub use console::ConsoleTransport;
pub use events::{HandlerError, InboundMessage, MessageContext, MessageHandler, OutboundMessage};
pub use runner::{ChannelRunner, MessageTransport, ReconnectPolicy, TransportError};
