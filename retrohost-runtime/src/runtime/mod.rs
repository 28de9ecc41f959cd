//! Native glue between cores and the runtime.
//!
//! `callbacks` holds the `extern "C"` functions a core receives through `retro_set_*`
//! and the interfaces returned by environment commands.

pub mod callbacks;
