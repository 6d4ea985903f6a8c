//! Session-lifecycle core: credential verification, token issuance and rotation,
//! and the guard that admits or rejects requests.
//! - Independent of the HTTP framework; the server crate adapts it to axum.
//! - Storage and hashing sit behind traits so the core can run against Postgres or in memory.

pub mod auth;
#[cfg(test)]
pub mod test_support;
