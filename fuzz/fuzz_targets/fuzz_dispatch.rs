#![no_main]

use std::sync::Arc;

use craftwire::protocol::outbox::Outbox;
use craftwire::{Dispatcher, HandlerRegistry};
use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;

static REGISTRY: Lazy<Arc<HandlerRegistry>> = Lazy::new(|| Arc::new(HandlerRegistry::with_defaults()));

fuzz_target!(|data: &[u8]| {
    // Every payload either dispatches or fails with an error, never a panic
    let mut dispatcher = Dispatcher::new(Arc::clone(&REGISTRY));
    let _ = dispatcher.dispatch(data, &mut Outbox::new());
});
