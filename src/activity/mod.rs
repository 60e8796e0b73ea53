pub mod debouncer;
pub mod suppress;

pub use debouncer::{ActivityDebouncer, ActivitySignal};
pub use suppress::{SuppressGuard, SUPPRESS_GRACE};
