//! The watched catalog resources.
//!
//! Gateway, linked-service and root watches run for the life of the process.
//! Instance, leaf and intention watches run per linked service and end when
//! the service is removed.

mod gateway;
mod instances;
mod intentions;
mod leaf;
mod roots;

pub(crate) use self::{
    gateway::Gateway, instances::Instances, intentions::Intentions, leaf::Leaf, roots::Roots,
};
