pub mod adwin;

pub use adwin::Adwin;
