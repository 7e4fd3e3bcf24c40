//! Unique invoice numbers from a single transactional counter
use sled::Tree;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
};

use crate::config::EngineConfig;
use crate::error::EngineError;

pub const COUNTERS_TREE: &str = "counters";
const INVOICE_COUNTER_KEY: &str = "invoice";

#[derive(Clone)]
pub struct InvoiceSequencer {
    counters: Tree,
    prefix: String,
    width: usize,
}

impl InvoiceSequencer {
    pub fn open(db: &sled::Db, config: &EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            counters: db.open_tree(COUNTERS_TREE)?,
            prefix: config.invoice_prefix.clone(),
            width: config.invoice_width,
        })
    }

    /// Read-increment-write inside one transaction; concurrent callers are
    /// serialized by sled and never observe the same value.
    pub fn next_invoice_number(&self) -> Result<String, EngineError> {
        let next = self
            .counters
            .transaction(|tx| -> ConflictableTransactionResult<u64, EngineError> {
                let current = match tx.get(INVOICE_COUNTER_KEY)? {
                    Some(bytes) => {
                        decode_counter(&bytes).map_err(ConflictableTransactionError::Abort)?
                    }
                    None => 0,
                };
                let next = current + 1;
                tx.insert(INVOICE_COUNTER_KEY, next.to_be_bytes().to_vec())?;
                Ok(next)
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => EngineError::Storage(e),
            })?;

        Ok(self.format(next))
    }

    /// Last number handed out, zero if none yet.
    pub fn current(&self) -> Result<u64, EngineError> {
        match self.counters.get(INVOICE_COUNTER_KEY)? {
            Some(bytes) => decode_counter(&bytes),
            None => Ok(0),
        }
    }

    pub fn format(&self, sequence: u64) -> String {
        format!("{}{:0width$}", self.prefix, sequence, width = self.width)
    }
}

fn decode_counter(bytes: &[u8]) -> Result<u64, EngineError> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| {
        EngineError::Encoding(format!(
            "invoice counter has {} bytes, expected 8",
            bytes.len()
        ))
    })?;
    Ok(u64::from_be_bytes(raw))
}
