pub mod apt;
pub mod connection;
pub mod container;
pub mod dependencies;
pub mod dpkg;
pub mod files;
pub mod journal;
