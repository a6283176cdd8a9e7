pub mod codec;
mod message;

pub use message::ControlMessage;
