pub mod job;
pub mod result;
pub mod speaker;
pub mod timeline;

pub use job::*;
pub use result::*;
pub use speaker::*;
pub use timeline::*;
