use chrono::Duration;
use derive_new::new;
use serde::{Deserialize, Serialize};

pub use listing::*;
pub use timestamp::*;
pub use viewer::*;

mod listing;
mod timestamp;
mod viewer;
