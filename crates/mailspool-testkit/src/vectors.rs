//! Golden vectors for the spool wire format.
//!
//! Any producer writing into a spool must emit these exact bytes, so both
//! sides can be checked against a fixed reference.

use mailspool_store::{Flag, MessageId};
use mailspool_sync::Command;

/// A command and its expected CBOR encoding.
#[derive(Debug, Clone)]
pub struct CommandVector {
    pub name: &'static str,
    pub command: Command,
    /// Expected encoding (hex).
    pub cbor: &'static str,
}

/// A record and its expected log frame.
#[derive(Debug, Clone)]
pub struct FrameVector {
    pub name: &'static str,
    pub payload: &'static [u8],
    /// Expected frame bytes (hex).
    pub frame: &'static str,
}

/// All command vectors.
pub fn command_vectors() -> Vec<CommandVector> {
    vec![
        CommandVector {
            name: "expunge",
            command: Command::Expunge,
            cbor: "a1626f7067657870756e6765",
        },
        CommandVector {
            name: "mark message 7 deleted",
            command: Command::set_flag(MessageId(7), Flag::DELETED, true),
            cbor: "a4626f70687365745f666c61676a6d6573736167655f69640764666c61676764656c657465646576616c7565f5",
        },
        CommandVector {
            name: "clear seen on message 1",
            command: Command::set_flag(MessageId(1), Flag::SEEN, false),
            cbor: "a4626f70687365745f666c61676a6d6573736167655f69640164666c6167647365656e6576616c7565f4",
        },
    ]
}

/// All frame vectors.
pub fn frame_vectors() -> Vec<FrameVector> {
    vec![
        FrameVector {
            name: "empty record",
            payload: b"",
            frame: "00000000",
        },
        FrameVector {
            name: "three bytes",
            payload: b"abc",
            frame: "03000000616263",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailspool_log::frame;

    #[test]
    fn test_command_vectors() {
        for vector in command_vectors() {
            let encoded = vector.command.serialize().unwrap();
            assert_eq!(hex::encode(&encoded), vector.cbor, "vector {}", vector.name);

            let decoded = Command::deserialize(&hex::decode(vector.cbor).unwrap()).unwrap();
            assert_eq!(decoded, vector.command, "vector {}", vector.name);
        }
    }

    #[test]
    fn test_frame_vectors() {
        for vector in frame_vectors() {
            let encoded = frame::encode(vector.payload).unwrap();
            assert_eq!(hex::encode(encoded), vector.frame, "vector {}", vector.name);
        }
    }
}
