mod codec;
mod crc;
mod hex;

pub use codec::{encode_payload, ArgosFrame};
