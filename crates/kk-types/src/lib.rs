//! Foundation types for the KubeKey object store.
//!
//! This crate provides the object model shared by the store, the codecs and
//! the registries that sit on top of them. Every stored resource is a serde
//! type carrying an [`ObjectMeta`]; the store only ever looks at that metadata
//! and treats the rest of the object as opaque payload.
//!
//! # Key Types
//!
//! - [`Object`] -- Trait implemented by every storable resource
//! - [`ObjectMeta`] / [`ListMeta`] / [`TypeMeta`] -- Standard metadata blocks
//! - [`ObjectList`] -- A typed list of objects with list metadata
//! - [`DynamicObject`] -- Schema-less object for resources without a Rust type
//! - [`GroupVersion`] / [`GroupResource`] -- API group naming
//! - [`Selector`] -- Label and field selector matching

pub mod error;
pub mod group;
pub mod meta;
pub mod object;
pub mod selector;

pub use error::TypeError;
pub use group::{GroupResource, GroupVersion, GroupVersionResource};
pub use meta::{ListMeta, ObjectMeta, TypeMeta};
pub use object::{DynamicObject, Object, ObjectList};
pub use selector::{Fields, Labels, Requirement, Selector};
