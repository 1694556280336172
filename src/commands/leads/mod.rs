pub mod handover;
pub mod intake;
pub mod items;

pub use handover::*;
pub use intake::*;
pub use items::*;
