//! Integration tests across modules, without sockets

mod dispatch_test;
mod session_test;
