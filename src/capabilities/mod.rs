//! Capability adapters (C1): small async traits injected per run-context,
//! each with a real reqwest-backed implementation and a deterministic Fake
//! for tests. Grounded in the teacher's `SearchService` trait
//! (`tools/search/service.rs`).

mod chat_model;
mod page_fetcher;
mod web_search;

pub use chat_model::{ChatModel, FakeChatModel, HttpChatModel};
pub use page_fetcher::{FakePageFetcher, HttpPageFetcher, PageFetcher};
pub use web_search::{FakeWebSearch, HttpWebSearch, WebSearch};
