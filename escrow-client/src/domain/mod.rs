mod hold;

pub use hold::*;
