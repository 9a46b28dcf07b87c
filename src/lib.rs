//! Uniform access to supernova light-curve and spectroscopy data releases.
//!
//! Each survey release is reached through the [`DataRelease`] trait and
//! serves its objects as [`DataTable`]s. A [`CombinedDataset`] puts several
//! releases behind one catalog and lets callers join object ids from
//! different surveys that observe the same supernova.
//!
//! ```no_run
//! use std::rc::Rc;
//! use sndata::{CombinedDataset, Config, DataRelease, DirectoryRelease, ObjectId};
//!
//! # fn main() -> sndata::Result<()> {
//! let config = Config::from_env()?;
//! let csp = DirectoryRelease::from_manifest("mirrors/csp_dr3".as_ref(), &config)?;
//! let des = DirectoryRelease::from_manifest("mirrors/des_sn3yr".as_ref(), &config)?;
//!
//! let releases: Vec<Rc<dyn DataRelease>> = vec![Rc::new(csp), Rc::new(des)];
//! let mut combined = CombinedDataset::new(releases)?;
//! combined.download_module_data(false)?;
//!
//! let a = ObjectId::new("2004dt", "DR3", "CSP");
//! let b = ObjectId::new("des_2004dt", "SN3YR", "DES");
//! combined.join_ids([a.clone(), b])?;
//! let table = combined.get_data_for_id(&a, true)?;
//! println!("{} rows", table.len());
//! # Ok(())
//! # }
//! ```

pub mod combined;
pub mod config;
pub mod data;
pub mod error;
pub mod release;
pub mod sample;

#[cfg(test)]
mod testing;

pub use combined::{
    Cluster, CombinedDataset, DataIter, FilterFn, IdentifierIndex, IdentityClusterer, IterOptions,
};
pub use config::Config;
pub use data::filter::{MetaFilter, non_empty};
pub use data::model::{DataTable, Meta, MetadataValue, OBJ_ID_KEY, ObjectId, Row};
pub use error::{Result, SnDataError};
pub use release::{
    Band, BandPasses, DataRelease, DataType, DirectoryRelease, ReleaseInfo, TableId,
};
