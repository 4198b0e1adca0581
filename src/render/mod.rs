pub(crate) mod annotate;
pub(crate) mod arena;
pub(crate) mod compositor;
pub(crate) mod density;
pub(crate) mod frame;
pub(crate) mod ramp;
