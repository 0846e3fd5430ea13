pub mod channel;
pub mod data;
pub mod device;
pub mod frame;
pub mod packet;
