mod ledger_error;

pub use ledger_error::LedgerError;
pub type Result<T> = std::result::Result<T, LedgerError>;
