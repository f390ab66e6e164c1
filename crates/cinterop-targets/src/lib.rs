//! Target platform model for the cinterop pipeline.
//!
//! A platform is identified by its target triple and carries everything the
//! later stages need to know about it:
//! - **Operating system + architecture:** parsed from the triple
//! - **Data model:** ILP32, LP64 or LLP64, which fixes the width of `long` and pointers
//! - **Primitive layout:** size and alignment of every C builtin type
//! - **System typedefs:** well-known typedef names and their canonical primitive

pub mod error;
pub mod parse;
pub mod platform;
pub mod primitives;
pub mod system;

pub use error::TargetError;
pub use platform::{builtin_platforms, Architecture, Bitness, DataModel, OperatingSystem, TargetPlatform};
pub use primitives::PrimitiveLayout;
pub use system::{is_well_known, system_typedef, SystemTypedef};
