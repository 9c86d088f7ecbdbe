mod error;
mod hash;
mod ids;
mod time;

pub use error::{err, Error, Result};
pub use hash::{merkle_root, sha256, xt_id};
pub use ids::{ChainId, Hash32, Slot, XtId};
pub use time::SlotClockParams;
