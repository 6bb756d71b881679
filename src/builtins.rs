//! Host functions installed in the global frame before user code runs.

use chrono::Utc;
use log::debug;

use crate::callable::NativeFunction;
use crate::value::Value;

/// Every built‑in, in registration order.
pub fn all() -> Vec<NativeFunction> {
    vec![clock()]
}

/// `clock()`: seconds since the Unix epoch, with sub‑second precision.
pub fn clock() -> NativeFunction {
    NativeFunction::new("clock", 0, |_args: &[Value]| {
        let now = Utc::now();
        let seconds: f64 = now.timestamp_micros() as f64 / 1_000_000.0;

        debug!("Native function 'clock' returned: {}", seconds);

        Ok(Value::Number(seconds))
    })
}
