mod dto;
mod handlers;
mod middleware;
mod response;
mod router;

pub use router::v1_router as router;
