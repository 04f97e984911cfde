//! Concrete site adapters

pub mod daishin;
pub mod dynamic;
pub mod hanaif;
pub mod hf;
pub mod kdi;
pub mod kif;
pub mod lh;
pub mod ricon;
