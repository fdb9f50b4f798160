//! Trait-bound helpers shared by every bridge trait.
//!
//! Bridge implementations are shared across tasks behind `Arc`, so every
//! capability must be `Send + Sync`. Keeping the bound behind one marker lets
//! the trait definitions stay short.

/// Marker trait for `Send + Sync` bridge implementations.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync + ?Sized {}
