pub mod attr;
pub mod record;
pub mod chain;
pub mod context;
pub mod extract;
pub mod compose;
pub mod handler;
pub mod middleware;
pub mod capture;

pub mod sink;
pub mod noop_sink;
pub mod sink_handler;
pub mod layer;

pub mod init;
pub mod env;
