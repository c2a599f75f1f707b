//! End-to-end tests: the upload server, the transfer client and the
//! offline queue wired together in one process.

mod helpers;
mod pipeline_test;
mod queue_test;
