use crate::source::RawLog;
use crate::store::{Delta, SignedAmount};
use alloy::sol;
use alloy::sol_types::SolEvent;
use alloy_primitives::{Address, B256, U256};
use tracing::warn;

sol! {
    event Transfer(address indexed from, address indexed to, uint256 value);
}

pub fn transfer_topic() -> B256 {
    Transfer::SIGNATURE_HASH
}

/// Decode one raw log into its signed balance deltas.
///
/// Zero, one, or two deltas come back. The zero address is the mint/burn
/// sentinel and never receives a delta: a mint debits nobody, a burn credits
/// nobody. The range filter should only ever hand us Transfer logs, so a log
/// that fails validation is logged as anomalous and skipped rather than
/// treated as an error.
pub fn decode_deltas(log: &RawLog) -> Vec<Delta> {
    if log.topics.first() != Some(&Transfer::SIGNATURE_HASH) || log.topics.len() < 3 {
        warn!(
            "Anomalous log at block {} tx {:?} index {}: {} topic(s), not a Transfer",
            log.block_number,
            log.tx_hash,
            log.log_index,
            log.topics.len()
        );
        return Vec::new();
    }

    let from = Address::from_word(log.topics[1]);
    let to = Address::from_word(log.topics[2]);
    let amount = decode_amount(&log.data);

    // A self-transfer nets to zero, and two deltas for one address would
    // collide on the (tx_hash, log_index, address) key.
    if from == to {
        return Vec::new();
    }

    let mut deltas = Vec::with_capacity(2);
    if from != Address::ZERO {
        deltas.push(Delta {
            block_number: log.block_number,
            tx_hash: log.tx_hash,
            log_index: log.log_index,
            address: from,
            amount: SignedAmount::debit(amount),
        });
    }
    if to != Address::ZERO {
        deltas.push(Delta {
            block_number: log.block_number,
            tx_hash: log.tx_hash,
            log_index: log.log_index,
            address: to,
            amount: SignedAmount::credit(amount),
        });
    }
    deltas
}

fn decode_amount(data: &[u8]) -> U256 {
    // ABI encodes uint256 as a single 32-byte word; an empty payload means 0
    if data.len() >= 32 {
        U256::from_be_slice(&data[..32])
    } else {
        U256::from_be_slice(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;

    fn transfer_log(from: Address, to: Address, amount: u64) -> RawLog {
        RawLog {
            block_number: 100,
            tx_hash: B256::repeat_byte(0x42),
            log_index: 3,
            topics: vec![
                Transfer::SIGNATURE_HASH,
                from.into_word(),
                to.into_word(),
            ],
            data: Bytes::from(U256::from(amount).to_be_bytes::<32>().to_vec()),
        }
    }

    #[test]
    fn ordinary_transfer_yields_debit_and_credit() {
        let a = Address::repeat_byte(0xaa);
        let b = Address::repeat_byte(0xbb);
        let deltas = decode_deltas(&transfer_log(a, b, 50));

        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].address, a);
        assert_eq!(deltas[0].amount, SignedAmount::debit(U256::from(50)));
        assert_eq!(deltas[1].address, b);
        assert_eq!(deltas[1].amount, SignedAmount::credit(U256::from(50)));
        assert_eq!(deltas[0].block_number, 100);
        assert_eq!(deltas[0].log_index, 3);
    }

    #[test]
    fn mint_yields_single_credit() {
        let x = Address::repeat_byte(0x0f);
        let deltas = decode_deltas(&transfer_log(Address::ZERO, x, 100));

        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].address, x);
        assert_eq!(deltas[0].amount, SignedAmount::credit(U256::from(100)));
    }

    #[test]
    fn burn_yields_single_debit() {
        let x = Address::repeat_byte(0x0f);
        let deltas = decode_deltas(&transfer_log(x, Address::ZERO, 100));

        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].address, x);
        assert_eq!(deltas[0].amount, SignedAmount::debit(U256::from(100)));
    }

    #[test]
    fn self_transfer_yields_nothing() {
        let x = Address::repeat_byte(0x0f);
        assert!(decode_deltas(&transfer_log(x, x, 10)).is_empty());
        assert!(decode_deltas(&transfer_log(Address::ZERO, Address::ZERO, 10)).is_empty());
    }

    #[test]
    fn too_few_topics_yields_nothing() {
        let mut log = transfer_log(Address::repeat_byte(1), Address::repeat_byte(2), 1);
        log.topics.truncate(2);
        assert!(decode_deltas(&log).is_empty());
    }

    #[test]
    fn wrong_signature_yields_nothing() {
        let mut log = transfer_log(Address::repeat_byte(1), Address::repeat_byte(2), 1);
        log.topics[0] = B256::repeat_byte(0xde);
        assert!(decode_deltas(&log).is_empty());
    }

    #[test]
    fn empty_payload_means_zero_amount() {
        let mut log = transfer_log(Address::repeat_byte(1), Address::repeat_byte(2), 0);
        log.data = Bytes::new();
        let deltas = decode_deltas(&log);

        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].amount, SignedAmount::ZERO);
        assert_eq!(deltas[1].amount, SignedAmount::ZERO);
    }
}
