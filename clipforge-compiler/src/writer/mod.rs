//! Binary serialization of compiled clips

mod clip;
mod stream;


pub use clip::write_clip;
pub(crate) use clip::write_root_motion;
pub use stream::{LinkId, StreamWriter};
