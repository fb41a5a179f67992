//! 提供商抽象模块：统一的聊天、流式、成本估算与健康检查接口。
//!
//! # Provider Abstraction
//!
//! Providers form a closed set of variants ([`ProviderKind`]) served by one concrete
//! [`ProviderInstance`] type. Differences between providers live in data
//! ([`ProviderDescriptor`], endpoint defaults) rather than in per-provider code paths.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ProviderKind`] | Built-in variants with endpoint defaults |
//! | [`ProviderDescriptor`] | Static capabilities, pricing, latency, quality, privacy tier |
//! | [`ProviderInstance`] | Live binding owning retry, circuit breaker and transport |
//! | [`ChatStream`] | Cancellable streamed response |
//! | [`HealthReport`] | Result of a health probe |

pub mod descriptor;
pub mod instance;
pub mod kind;
mod payload;
pub mod stream;

pub use descriptor::ProviderDescriptor;
pub use instance::{HealthReport, ProviderConfig, ProviderInstance, DEFAULT_COMPLETION_ESTIMATE};
pub use kind::ProviderKind;
pub use payload::GeneratedImage;
pub use stream::{CancelHandle, ChatStream};
