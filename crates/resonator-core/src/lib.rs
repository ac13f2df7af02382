pub mod consts;
pub mod error;
pub mod extract;
pub mod filters;
pub mod frame;
pub mod io;
pub mod pipeline;
pub mod reduce;
pub mod register;
pub mod roi;
