//! End-to-end tests against a local mock HTTP server

mod end_to_end;
mod mock_server;
