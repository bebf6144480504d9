#![allow(async_fn_in_trait)]
pub mod config;
mod error;
pub mod fetch;
pub mod inventory;
pub mod landsat8;
pub mod provider;
pub mod remote;
pub mod s3;
pub mod scene;
pub mod scene_id;
pub mod sentinel2;
pub mod url_builder;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use landsat8::Landsat8;
pub use provider::{BatchReport, ProviderKind};
pub use scene::{Scene, SceneCollection};
pub use scene_id::Family;
pub use sentinel2::Sentinel2;
