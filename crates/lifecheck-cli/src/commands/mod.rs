pub mod parity;
pub mod run;
pub mod short_id;
