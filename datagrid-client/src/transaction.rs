//! Transaction handles.
//!
//! The engine only carries the server-assigned transaction id on each
//! request; begin/commit/rollback live in the surrounding SDK. Absence of a
//! handle means autocommit: each operation is its own implicit transaction.

use datagrid_core::protocol::constants::TX_AUTOCOMMIT;

/// An explicit server-side transaction handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    id: i64,
}

impl Transaction {
    /// Wraps a server-assigned transaction id.
    pub fn new(id: i64) -> Self {
        Self { id }
    }

    /// Returns the transaction id.
    pub fn id(&self) -> i64 {
        self.id
    }
}

/// Returns the wire marker for an optional transaction: the handle id, or
/// the autocommit sentinel when absent.
pub(crate) fn tx_marker(tx: Option<&Transaction>) -> i64 {
    tx.map(Transaction::id).unwrap_or(TX_AUTOCOMMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_with_transaction() {
        let tx = Transaction::new(77);
        assert_eq!(tx_marker(Some(&tx)), 77);
    }

    #[test]
    fn test_marker_autocommit() {
        assert_eq!(tx_marker(None), TX_AUTOCOMMIT);
    }
}
