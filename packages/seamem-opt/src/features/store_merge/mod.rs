//! Adjacent-store merger: combines consecutive narrow stores into one
//! wider store when provably adjacent and unconditionally ordered.

pub mod infrastructure;

pub use infrastructure::run;
