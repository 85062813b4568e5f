//! JSON output for run outcomes, history and export listings.
//!
//! Everything printed with `--json` goes through here so scripts get the
//! same shape regardless of the report backend.

use serde::Serialize;

pub fn render<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}
