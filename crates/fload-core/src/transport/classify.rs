//! Map raw RPC error text to the signals the engine acts on.

use super::TransportError;
use crate::location::NodeId;

pub const FILE_MIGRATE_PREFIX: &str = "FILE_MIGRATE_";
pub const OFFSET_INVALID: &str = "OFFSET_INVALID";

/// Classify an RPC error. `FILE_MIGRATE_<n>` becomes a migration to node
/// `n` (an unparsable node is a plain failure), `OFFSET_INVALID` becomes the
/// invalid-offset signal, anything else is `Other`.
pub fn classify_rpc_error(code: i32, text: &str) -> TransportError {
    if let Some(idx) = text.find(FILE_MIGRATE_PREFIX) {
        let digits: String = text[idx + FILE_MIGRATE_PREFIX.len()..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        return match digits.parse::<i32>() {
            Ok(n) => TransportError::Migrate(NodeId(n)),
            Err(_) => TransportError::Other(format!("{}: {}", code, text)),
        };
    }
    if text.contains(OFFSET_INVALID) {
        return TransportError::InvalidOffset;
    }
    TransportError::Other(format!("{}: {}", code, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_with_node() {
        assert_eq!(
            classify_rpc_error(303, "FILE_MIGRATE_4"),
            TransportError::Migrate(NodeId(4))
        );
        assert_eq!(
            classify_rpc_error(303, "FILE_MIGRATE_12 extra"),
            TransportError::Migrate(NodeId(12))
        );
    }

    #[test]
    fn migrate_without_node_is_other() {
        assert!(matches!(
            classify_rpc_error(303, "FILE_MIGRATE_X"),
            TransportError::Other(_)
        ));
    }

    #[test]
    fn offset_invalid() {
        assert_eq!(
            classify_rpc_error(400, "OFFSET_INVALID"),
            TransportError::InvalidOffset
        );
    }

    #[test]
    fn everything_else_is_other() {
        match classify_rpc_error(500, "INTERNAL") {
            TransportError::Other(msg) => assert_eq!(msg, "500: INTERNAL"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
