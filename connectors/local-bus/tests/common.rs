use tracing::Level;

#[ctor::ctor]
fn init_tracing() { let _ = tracing_subscriber::fmt().with_max_level(Level::DEBUG).with_test_writer().try_init(); }
