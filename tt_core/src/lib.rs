//! `tt_core`
//!
//! Object lifetime management shared by the engine subsystems.
//!
//! Design goals:
//! - Stable, generation-checked handles instead of raw references.
//! - Densely packed pools that can reorder freely without breaking handles.
//! - Asset caches that never keep an asset alive on their own.
//! - No `unsafe`.

pub mod asset_cache;
pub mod config;
pub mod context;
pub mod error;
pub mod handle;
pub mod handle_array_mgr;
pub mod handle_mgr;
pub mod hash;
pub mod texture_data;
pub mod texture_data_cache;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::asset_cache::*;
    pub use crate::config::*;
    pub use crate::context::*;
    pub use crate::error::HandleError;
    pub use crate::handle::*;
    pub use crate::handle_array_mgr::*;
    pub use crate::handle_mgr::*;
    pub use crate::hash::*;
    pub use crate::texture_data::*;
    pub use crate::texture_data_cache::*;
}
