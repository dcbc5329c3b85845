pub mod atomic;
pub mod cmd;
