mod annotate;
mod converters;
mod executor;
mod fixture;
mod instruction;
mod runner;
mod script;
mod suite;
mod symbols;
mod table;

pub use annotate::*;
pub use converters::*;
pub use executor::*;
pub use fixture::{
    demo_registry, Calculator, ClassRegistry, Constructor, Fixture, FixtureClass, MethodDef,
};
pub use instruction::*;
pub use runner::*;
pub use script::*;
pub use suite::*;
pub use symbols::*;
pub use table::*;
