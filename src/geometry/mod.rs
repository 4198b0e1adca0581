pub(crate) mod planner;
pub(crate) mod view;
