#![allow(dead_code)]

pub mod builders;
pub mod jobs;
pub mod recorder;
pub mod strategies;

pub use builders::*;
pub use jobs::*;
pub use recorder::*;
