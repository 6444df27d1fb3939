pub mod tenant;

pub use tenant::ResolvedTenant;
