//! Wire protocol for Parlor.
//!
//! Defines the messages clients and the server exchange over the
//! persistent connection, the create-room API contract, and the codec
//! that turns them into bytes. The protocol layer knows nothing about
//! connections or rooms beyond the shapes it carries.

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientMessage, CreateRoomRequest, CreateRoomResponse, ServerMessage, SystemEvent,
};
