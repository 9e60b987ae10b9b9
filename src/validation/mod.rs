pub mod version_classifier;

pub use version_classifier::{Channel, PackageQuality, RepositoryVersionInfo, classify};
