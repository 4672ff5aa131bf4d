pub mod mock;
pub mod remote;
