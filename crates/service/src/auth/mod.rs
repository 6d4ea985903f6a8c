//! Auth module: domain types, token codec, credential hasher, user directory,
//! session service and request guard.

pub mod domain;
pub mod errors;
pub mod guard;
pub mod hasher;
pub mod repo;
pub mod repository;
pub mod service;
pub mod token;

pub use guard::{Access, GuardDecision, RequestGuard};
pub use service::SessionService;
pub use token::{TokenCodec, TokenConfig, TokenKind};
