//! LMDB environment setup.

use std::path::{Path, PathBuf};

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use lattice_store::{ReadTxn, Store, StoreError, Table, WriteTxn};
use tracing::info;

use crate::transaction::{LmdbReadTxn, LmdbWriteTxn};
use crate::LmdbError;

/// Default LMDB map size: 1 GiB.
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

/// Database handles, one per [`Table`].
#[derive(Clone, Copy)]
pub(crate) struct Databases {
    confirmation_height: Database<Bytes, Bytes>,
    online_weight: Database<Bytes, Bytes>,
    rep_weights: Database<Bytes, Bytes>,
}

impl Databases {
    pub(crate) fn get(&self, table: Table) -> Database<Bytes, Bytes> {
        match table {
            Table::ConfirmationHeight => self.confirmation_height,
            Table::OnlineWeight => self.online_weight,
            Table::RepWeights => self.rep_weights,
        }
    }
}

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Env,
    dbs: Databases,
    path: PathBuf,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment in the directory `path`.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per directory by this
        // process and the memory map is never accessed outside heed.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(Table::ALL.len() as u32)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let confirmation_height =
            env.create_database(&mut wtxn, Some(Table::ConfirmationHeight.name()))?;
        let online_weight = env.create_database(&mut wtxn, Some(Table::OnlineWeight.name()))?;
        let rep_weights = env.create_database(&mut wtxn, Some(Table::RepWeights.name()))?;
        wtxn.commit()?;

        info!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            env,
            dbs: Databases {
                confirmation_height,
                online_weight,
                rep_weights,
            },
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Store for LmdbEnvironment {
    fn tx_begin_read(&self) -> Result<Box<dyn ReadTxn + '_>, StoreError> {
        let txn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(Box::new(LmdbReadTxn::new(txn, self.dbs)))
    }

    fn tx_begin_write(&self) -> Result<Box<dyn WriteTxn + '_>, StoreError> {
        let txn = self.env.write_txn().map_err(LmdbError::from)?;
        Ok(Box::new(LmdbWriteTxn::new(txn, self.dbs)))
    }
}
