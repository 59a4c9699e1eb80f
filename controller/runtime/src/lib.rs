#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use tgw_controller_as3 as as3;
pub use tgw_controller_catalog as catalog;
pub use tgw_controller_core as core;
pub use tgw_controller_index as index;

mod args;
pub mod config;
mod duration;
mod publish;

pub use self::{
    args::{Args, Command},
    config::{Config, Overrides, Settings},
    publish::{PublishMetrics, Publisher},
};
