//! Dedup filter: decides which fetched transactions are new for a channel.
//!
//! The explorer is queried from the cursor height inclusive, so the batch
//! normally repeats the boundary block. Transactions above the cursor height
//! are new; at the cursor height they are new only if their key is not in the
//! boundary set; below it they are dropped (reorgs are not repaired).

use walletpush_common::types::{Channel, ProgressCursor, Transaction};

/// Result of filtering one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// New transactions for the channel, oldest first.
    pub picked: Vec<Transaction>,
    /// Cursor after the whole batch.
    pub cursor: ProgressCursor,
}

/// Select the transactions in `txs` that are new for `channel` given `cursor`.
///
/// Pure function of its inputs. The resulting cursor height is the highest
/// height seen (never below the input cursor), and its boundary set holds
/// exactly the keys seen at that height, plus the previous boundary keys when
/// the height did not move.
pub fn select(channel: Channel, cursor: &ProgressCursor, txs: &[Transaction]) -> Selection {
    let mut ordered: Vec<&Transaction> = txs
        .iter()
        .filter(|tx| tx.block_height >= cursor.last_notified_height)
        .collect();
    ordered.sort_by(|a, b| {
        (a.block_height, a.log_index, &a.hash).cmp(&(b.block_height, b.log_index, &b.hash))
    });

    let mut running = cursor.clone();
    running.channel = channel;
    let mut picked = Vec::new();

    for tx in ordered {
        let key = tx.dedup_key();
        let is_new = if tx.block_height > running.last_notified_height {
            running.last_notified_height = tx.block_height;
            running.last_notified_tx_hashes.clear();
            running.last_notified_tx_hashes.insert(key);
            true
        } else if tx.block_height == cursor.last_notified_height
            && cursor.last_notified_tx_hashes.contains(&key)
        {
            false
        } else {
            // Same height as the running cursor: new unless it repeats within the batch.
            running.last_notified_tx_hashes.insert(key)
        };

        if is_new && tx.has_hint(channel) {
            picked.push(tx.clone());
        }
    }

    Selection {
        picked,
        cursor: running,
    }
}
