//! `civicetl-core` keeps a local mirror of Boston civic datasets.
//!
//! This crate includes:
//! - **Source registry** ([`sources`]): the yearly 311 CSV files and the
//!   zipped shapefiles the project knows about.
//! - **Tabular fetcher** ([`tabular`]): downloads any missing year.
//! - **Geospatial preparers** ([`prepare`]): turn shapefile archives into
//!   GeoParquet, optionally clipping one layer by a boundary.
//! - **Inspection** ([`info`]): schema and geometry summaries of local files.
//!
//! Network access goes through the [`download::Downloader`] trait.

pub mod archive;
pub mod download;
pub mod error;
pub mod info;
pub mod layout;
pub mod prepare;
pub mod sources;
pub mod tabular;
pub mod types;
pub mod utils;
