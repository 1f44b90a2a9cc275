//! Statistical building blocks of GO-PCA
//!
//! - [`hypergeom`]: hypergeometric tail probabilities
//! - [`xlmhg`]: the XL-mHG enrichment test on ranked lists
//! - [`Linkage`]: average linkage clustering, used to order signature matrices

pub mod hypergeom;
mod linkage;
pub mod xlmhg;

pub use linkage::cluster;
pub use linkage::Linkage;
