mod kv;
mod timer;

pub use self::kv::{Kv, KvError, KvOperation, KvOutput, MAX_KEY_LENGTH, MAX_VALUE_BYTES};
pub use self::timer::{Timer, TimerOperation, TimerOutput};

pub use crux_core::render::Render;
pub use crux_http::Http;
