use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("consensus error: {0}")]
    Consensus(#[from] lattice_consensus::ConsensusError),

    #[error("store error: {0}")]
    Store(#[from] lattice_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] lattice_store_lmdb::LmdbError),

    #[error("vote signature is invalid")]
    SignatureInvalid,

    #[error("config error: {0}")]
    Config(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
