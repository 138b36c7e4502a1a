//! Integration test crate for vidframe.
//!
//! This crate exists solely to hold integration tests that drive buffers,
//! frames and image conversion together through the public API.



#[cfg(test)]
mod images;

/// Install a test-writer subscriber filtered by `RUST_LOG`. Safe to call
/// from every test.
#[cfg(test)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
