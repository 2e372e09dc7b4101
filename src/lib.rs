pub mod util;
pub mod config;

pub mod model;
pub mod view;
