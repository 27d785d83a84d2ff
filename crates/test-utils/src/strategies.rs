//! Proptest strategies for Lodestone domain types.
//!
//! Reusable generators for property-based testing across crates. Strategies
//! produce well-formed domain values while exploring edge cases through
//! random variation.

use lodestone_types::{ApplicationData, LogEntry, NodeId, Payload, ServerConfiguration};
use proptest::prelude::*;

/// Generates an arbitrary member name of 1-8 lowercase characters with an
/// optional numeric suffix.
pub fn arb_node_id() -> impl Strategy<Value = NodeId> {
    "[a-z]{1,8}(-[0-9]{1,2})?".prop_map(NodeId::new)
}

/// Generates a membership configuration with 1-3 voting and 0-2 non-voting
/// members.
pub fn arb_server_configuration() -> impl Strategy<Value = ServerConfiguration> {
    (
        proptest::collection::btree_set(arb_node_id(), 1..4),
        proptest::collection::btree_set(arb_node_id(), 0..3),
    )
        .prop_map(|(voting, non_voting)| ServerConfiguration { voting, non_voting, migrated: false })
}

/// Generates an arbitrary replicated payload, weighted toward application
/// data.
pub fn arb_payload() -> impl Strategy<Value = Payload> {
    prop_oneof![
        4 => (proptest::collection::vec(any::<u8>(), 0..32), any::<bool>()).prop_map(
            |(bytes, persistent)| Payload::Data(ApplicationData {
                bytes,
                persistent,
                migrated: false,
            })
        ),
        1 => arb_server_configuration().prop_map(Payload::ServerConfig),
        1 => Just(Payload::noop()),
    ]
}

/// Generates a contiguous run of up to `max` log entries starting at index
/// 0 in term 1.
pub fn arb_entries(max: usize) -> impl Strategy<Value = Vec<LogEntry>> {
    proptest::collection::vec(arb_payload(), 0..max).prop_map(|payloads| {
        payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| LogEntry::new(i as i64, 1, payload))
            .collect()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_entries_are_contiguous(entries in arb_entries(16)) {
            for (offset, entry) in entries.iter().enumerate() {
                prop_assert_eq!(entry.index, offset as i64);
            }
        }

        #[test]
        fn generated_configurations_have_voters(config in arb_server_configuration()) {
            prop_assert!(!config.voting.is_empty());
        }
    }
}
