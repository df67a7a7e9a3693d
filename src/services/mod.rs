/// OpenAPI documentation generation.
pub mod documentation;
/// Duel flow: queueing, relay, completion.
pub mod duel_service;
/// Health check service.
pub mod health_service;
/// Match outcome and settlement computation.
pub mod outcome;
/// Profile lookups and edits.
pub mod profile_service;
/// Background worker applying queued settlements.
pub mod settlement_worker;
/// Storage connection supervisor with backoff and degraded mode.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
