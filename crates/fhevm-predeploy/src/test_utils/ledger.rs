use std::{collections::HashMap, sync::Mutex};

use alloy_primitives::{keccak256, Address, Bytes, TxHash};

use super::REVERT_MARKER;
use crate::{DeployerIdentity, Ledger, LedgerError, TxReceipt, TxRequest};

/// A transaction accepted by the [`MockLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTx {
    /// The signer
    pub from: Address,
    /// The request as submitted
    pub request: TxRequest,
    /// The assigned hash
    pub tx_hash: TxHash,
}

#[derive(Debug, Default)]
struct MockState {
    nonces: HashMap<Address, u64>,
    code: HashMap<Address, Bytes>,
    receipts: HashMap<TxHash, TxReceipt>,
    sent: Vec<SentTx>,
    block_number: u64,
    interference: Vec<(usize, Address)>,
    failing_reads: u32,
    withhold_receipts: bool,
}

impl MockState {
    fn read(&mut self) -> Result<(), LedgerError> {
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(LedgerError::Transport("connection reset by peer".to_string()));
        }
        Ok(())
    }
}

/// An in-memory [`Ledger`] that executes transactions instantly.
///
/// - A creation stores its input as code at `from.create(nonce)` and succeeds, unless the input
///   starts with [`REVERT_MARKER`].
/// - A call succeeds iff the code at the target contains the call's 4-byte selector.
/// - A transaction whose nonce is not the sender's current one is rejected.
#[derive(Debug, Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    /// Sets the transaction count of `address`.
    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.state.lock().unwrap().nonces.insert(address, nonce);
    }

    /// Sets the transaction count of `address`.
    pub fn with_nonce(self, address: Address, nonce: u64) -> Self {
        self.set_nonce(address, nonce);
        self
    }

    /// The transaction count of `address`.
    pub fn nonce(&self, address: Address) -> u64 {
        self.state.lock().unwrap().nonces.get(&address).copied().unwrap_or_default()
    }

    /// Sets the code at `address`.
    pub fn set_code(&self, address: Address, code: Bytes) {
        self.state.lock().unwrap().code.insert(address, code);
    }

    /// The code at `address`.
    pub fn code(&self, address: Address) -> Bytes {
        self.state.lock().unwrap().code.get(&address).cloned().unwrap_or_default()
    }

    /// Simulates a transaction sent by someone else from `account` right after the
    /// `submission`-th accepted transaction (1-based).
    pub fn inject_after(&self, submission: usize, account: Address) {
        self.state.lock().unwrap().interference.push((submission, account));
    }

    /// Fails the next `count` reads with a transport error.
    pub fn fail_reads(&self, count: u32) {
        self.state.lock().unwrap().failing_reads = count;
    }

    /// Accepts transactions but never reports a receipt.
    pub fn withhold_receipts(&self) {
        self.state.lock().unwrap().withhold_receipts = true;
    }

    /// Every accepted transaction, in submission order.
    pub fn sent(&self) -> Vec<SentTx> {
        self.state.lock().unwrap().sent.clone()
    }
}

impl Ledger for MockLedger {
    async fn transaction_count(&self, address: Address) -> Result<u64, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.read()?;
        Ok(state.nonces.get(&address).copied().unwrap_or_default())
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.read()?;
        Ok(state.code.get(&address).cloned().unwrap_or_default())
    }

    async fn send_transaction(
        &self,
        from: &DeployerIdentity,
        request: TxRequest,
    ) -> Result<TxHash, LedgerError> {
        let mut state = self.state.lock().unwrap();
        let sender = from.address();
        let current = state.nonces.get(&sender).copied().unwrap_or_default();
        if request.nonce != current {
            return Err(LedgerError::Rejected(format!(
                "nonce {} does not match account nonce {current}",
                request.nonce
            )));
        }
        state.nonces.insert(sender, current + 1);
        state.block_number += 1;

        let tx_hash = keccak256([sender.as_slice(), &request.nonce.to_be_bytes()[..]].concat());
        let (success, contract_address) = match request.to {
            None => {
                let address = sender.create(request.nonce);
                if request.input.first() == Some(&REVERT_MARKER) {
                    (false, None)
                } else {
                    state.code.insert(address, request.input.clone());
                    (true, Some(address))
                }
            }
            Some(to) => {
                let code = state.code.get(&to).cloned().unwrap_or_default();
                let success = request.input.len() >= 4 &&
                    code.windows(4).any(|window| window == &request.input[..4]);
                (success, None)
            }
        };
        let receipt = TxReceipt {
            tx_hash,
            block_number: Some(state.block_number),
            success,
            contract_address,
            gas_used: 21_000,
        };
        if !state.withhold_receipts {
            state.receipts.insert(tx_hash, receipt);
        }
        state.sent.push(SentTx { from: sender, request, tx_hash });

        let submitted = state.sent.len();
        let injected: Vec<Address> = state
            .interference
            .iter()
            .filter(|(after, _)| *after == submitted)
            .map(|(_, account)| *account)
            .collect();
        for account in injected {
            *state.nonces.entry(account).or_default() += 1;
        }
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<TxReceipt>, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.read()?;
        Ok(state.receipts.get(&tx_hash).copied())
    }
}
