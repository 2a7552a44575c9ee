//! Proptest generators for property-based testing.

use proptest::prelude::*;

use mailspool_crypto::KeyPair;
use mailspool_store::{Flag, MessageId};
use mailspool_sync::Command;

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = KeyPair> {
    any::<[u8; 32]>().prop_map(KeyPair::from_seed)
}

/// Generate a message id.
pub fn message_id() -> impl Strategy<Value = MessageId> {
    any::<u64>().prop_map(MessageId)
}

/// Generate a flag: mostly well-known names, sometimes a custom keyword.
pub fn flag() -> impl Strategy<Value = Flag> {
    prop_oneof![
        3 => Just(Flag::SEEN),
        3 => Just(Flag::DELETED),
        1 => Just(Flag::FLAGGED),
        1 => Just(Flag::ANSWERED),
        2 => "\\$?[a-z][a-z0-9_]{0,15}".prop_map(Flag::new),
    ]
}

/// Generate a command.
pub fn command() -> impl Strategy<Value = Command> {
    prop_oneof![
        4 => (message_id(), flag(), any::<bool>())
            .prop_map(|(id, flag, value)| Command::set_flag(id, flag, value)),
        1 => Just(Command::Expunge),
    ]
}

/// Generate a command addressed to one of `ids`.
pub fn command_for(ids: Vec<MessageId>) -> impl Strategy<Value = Command> {
    prop_oneof![
        4 => (prop::sample::select(ids), flag(), any::<bool>())
            .prop_map(|(id, flag, value)| Command::set_flag(id, flag, value)),
        1 => Just(Command::Expunge),
    ]
}

/// Generate a sequence of up to `max_len` commands addressed to `ids`.
pub fn commands(ids: Vec<MessageId>, max_len: usize) -> impl Strategy<Value = Vec<Command>> {
    prop::collection::vec(command_for(ids), 0..=max_len)
}

/// Generate opaque record bytes of up to `max_len` bytes.
pub fn record(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}
