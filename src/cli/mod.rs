pub mod apply;
pub mod command;
pub mod info;
pub mod play;
