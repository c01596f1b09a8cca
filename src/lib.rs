//! # AirTag Assistant
//!
//! Grounded question answering over a small Apple AirTag / Find My
//! knowledge base.
//!
//! Questions pass a rule-based guardrail, retrieve cited chunks (vector
//! search with a lexical keyword fallback), and are answered by a chat
//! model constrained to the retrieved context.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────┐   ┌──────────────┐
//! │ Knowledge  │──▶│  Ingest  │──▶│    SQLite    │
//! │ (markdown) │   │ Chunk+Emb│   │ vector store │
//! └─────┬──────┘   └──────────┘   └──────┬───────┘
//!       │ lexical fallback               │ vector tier
//!       ▼                                ▼
//! ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌──────┐
//! │ Guardrail│──▶│ Retriever │──▶│  Prompt  │──▶│ Chat │
//! └──────────┘   └───────────┘   └──────────┘   └──────┘
//!        ▲
//!   CLI (airtag ask) / HTTP (POST /api/chat)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! airtag init                       # create the vector store schema
//! airtag ingest                     # chunk + embed ./data/airtags
//! airtag ask "how does precision finding work"
//! airtag serve                      # POST /api/chat on 127.0.0.1:3000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Shared value types |
//! | [`text`] | Whitespace and token normalization, scoring helpers |
//! | [`chunk`] | Paragraph chunking with overlap |
//! | [`guardrail`] | Small-talk, safety, and scope classification |
//! | [`knowledge`] | Knowledge documents and title/URL extraction |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`chat`] | Chat-completion provider abstraction |
//! | [`http`] | JSON POST with retry, shared by providers |
//! | [`workers_ai`] | Cloudflare Workers AI client |
//! | [`store`] | Vector store trait, SQLite and in-memory backends |
//! | [`retriever`] | Vector retrieval with lexical fallback |
//! | [`prompt`] | System and user prompt construction |
//! | [`pipeline`] | Question-answering orchestrator |
//! | [`ingest`] | Knowledge base ingest workflow |
//! | [`server`] | HTTP server |
//! | [`error`] | Answer-boundary errors |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod guardrail;
pub mod http;
pub mod ingest;
pub mod knowledge;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod server;
pub mod store;
pub mod text;
pub mod workers_ai;
