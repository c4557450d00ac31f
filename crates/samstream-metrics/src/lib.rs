pub mod classification;

pub use classification::{accuracy, cohen_kappa, confusion_matrix, kappa_temporal};
