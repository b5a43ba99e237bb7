//! sysdefs (System Definitions) is a dependency-light crate meant exclusively
//! to contain definitions for the platforms the packages are built for and
//! tested on: Debian architectures, distributions and the output directory
//! naming that ties them together.
//!
//! As the name implies, the crate mainly provides definitions, and should
//! contain minimal or no behavior at all.
//!

pub mod arch;
pub mod distro;
