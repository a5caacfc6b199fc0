//! End-to-end tests against a server on an ephemeral port

mod realtime_test;
