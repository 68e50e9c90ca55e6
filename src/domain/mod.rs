pub mod donation;
pub mod payment;
pub mod payment_info;

pub use donation::*;
pub use payment::*;
pub use payment_info::*;
