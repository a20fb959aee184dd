//! Provides types that describe what a host should look like, independent of how it gets there.

pub mod catalog;
pub mod fragment;
pub mod resource;
pub mod template;

#[doc(inline)]
pub use catalog::Catalog;

#[doc(inline)]
pub use resource::Resource;
