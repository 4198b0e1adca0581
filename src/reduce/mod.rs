pub(crate) mod intensity;
pub(crate) mod kernels;
pub(crate) mod strategy;
