//! 类型系统模块：定义请求、响应与能力等核心数据类型。
//!
//! # Types Module
//!
//! Strongly-typed representations of everything that flows through the orchestrator.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChatRequest`] | Immutable request with messages, strategy, requirements and constraints |
//! | [`ChatResponse`] | Normalized provider response |
//! | [`StreamEvent`] | Streaming fragment, terminated by `Done` |
//! | [`Capability`] | Capability flag declared by providers and required by requests |
//! | [`PrivacyTier`] | Data-handling tier (public < private < regulated) |
//!
//! ## Example
//!
//! ```rust
//! use ai_lib_orchestrator::types::{ChatRequest, Constraints, Message};
//! use ai_lib_orchestrator::strategy::StrategyKind;
//!
//! let request = ChatRequest::builder()
//!     .message(Message::user("Hi"))
//!     .strategy(StrategyKind::CostOptimized)
//!     .constraints(Constraints::new().with_max_cost(0.01))
//!     .build()
//!     .unwrap();
//! assert_eq!(request.word_count(), 1);
//! ```

pub mod capability;
pub mod message;
pub mod request;
pub mod response;
pub mod tool;

pub use capability::{Capability, CapabilitySet, PrivacyTier};
pub use message::{Message, MessageRole};
pub use request::{ChatRequest, ChatRequestBuilder, Constraints, GenerationParams, Requirements};
pub use response::{ChatResponse, StreamEvent, Usage};
pub use tool::{ToolCall, ToolDefinition};
