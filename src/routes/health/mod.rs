mod handler;
mod model;

pub use handler::healthz;
pub use model::AppInfo;
