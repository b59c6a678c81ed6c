// Adapters layer: concrete implementations for external systems (http transport, storage).

pub mod http;
pub mod storage;
