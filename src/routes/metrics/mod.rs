mod handler;

pub use handler::metrics;
